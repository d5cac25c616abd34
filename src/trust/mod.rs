//! Which hosts the client may fetch from or send the user to.
//!
//! [`TrustPolicy`] answers "is this URL trusted"; [`LinkGate`] puts the
//! confirmation dialog in front of everything that is not.

mod gate;
mod policy;

pub use gate::{
    ConfirmChoice, ConfirmationPrompt, GateError, GateOutcome, LinkAssessment, LinkGate,
    LinkOpener, LinkRisk, SystemOpener,
};
pub use policy::{
    normalize_domain, TrustDecision, TrustError, TrustPolicy, DEFAULT_TRUSTED_DOMAINS,
    TRUSTED_DOMAINS_KEY,
};
