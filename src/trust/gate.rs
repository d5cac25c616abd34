use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use super::policy::TrustPolicy;
use crate::util::{check_public_url, check_scheme, UrlValidationError};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Failed to open {url}: {source}")]
    Open {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a link needs the user's confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRisk {
    /// The host is not on the allow-list.
    UntrustedDomain,
    /// The URL points at loopback or a private network.
    FlaggedUnsafe,
}

/// The user's answer in the confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    ProceedOnce,
    TrustDomainPermanently,
    Cancel,
}

/// Confirmation dialog shown before an untrusted link is opened.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, url: &Url, risk: LinkRisk) -> ConfirmChoice;
}

/// Hands a URL to whatever displays it outside the client.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &Url) -> Result<(), GateError>;
}

/// Opens links with the platform's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &Url) -> Result<(), GateError> {
        open::that(url.as_str()).map_err(|source| GateError::Open {
            url: url.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAssessment {
    /// Trusted; open without asking.
    Open(Url),
    /// Ask the user first.
    Confirm { url: Url, risk: LinkRisk },
    /// Not something the client will open at all.
    Reject { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Opened,
    OpenedAndTrusted,
    Cancelled,
    Rejected,
}

/// The confirmation gate every outbound navigation goes through.
pub struct LinkGate {
    policy: Arc<TrustPolicy>,
    opener: Arc<dyn LinkOpener>,
}

impl LinkGate {
    pub fn new(policy: Arc<TrustPolicy>, opener: Arc<dyn LinkOpener>) -> Self {
        Self { policy, opener }
    }

    pub fn policy(&self) -> &Arc<TrustPolicy> {
        &self.policy
    }

    pub fn assess(&self, raw: &str) -> LinkAssessment {
        let url = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(e) => {
                return LinkAssessment::Reject {
                    reason: e.to_string(),
                }
            }
        };
        if let Err(e) = check_scheme(&url) {
            return LinkAssessment::Reject {
                reason: e.to_string(),
            };
        }

        match check_public_url(&url) {
            Err(UrlValidationError::MissingHost) => LinkAssessment::Reject {
                reason: UrlValidationError::MissingHost.to_string(),
            },
            Err(e) => {
                tracing::debug!(url = %url, reason = %e, "Link flagged as unsafe");
                LinkAssessment::Confirm {
                    url,
                    risk: LinkRisk::FlaggedUnsafe,
                }
            }
            Ok(()) if self.policy.is_trusted_url(&url) => LinkAssessment::Open(url),
            Ok(()) => LinkAssessment::Confirm {
                url,
                risk: LinkRisk::UntrustedDomain,
            },
        }
    }

    /// Carries out the user's answer to a confirmation.
    ///
    /// Unsafe links are never added to the allow-list; choosing to trust one
    /// opens it once.
    pub async fn apply_choice(
        &self,
        url: &Url,
        risk: LinkRisk,
        choice: ConfirmChoice,
    ) -> Result<GateOutcome, GateError> {
        match choice {
            ConfirmChoice::Cancel => {
                tracing::debug!(url = %url, "Navigation cancelled");
                Ok(GateOutcome::Cancelled)
            }
            ConfirmChoice::ProceedOnce => {
                self.opener.open(url)?;
                Ok(GateOutcome::Opened)
            }
            ConfirmChoice::TrustDomainPermanently if risk == LinkRisk::FlaggedUnsafe => {
                tracing::warn!(url = %url, "Refusing to trust an unsafe host, opening once");
                self.opener.open(url)?;
                Ok(GateOutcome::Opened)
            }
            ConfirmChoice::TrustDomainPermanently => {
                if let Err(e) = self.policy.trust_host_of(url).await {
                    tracing::warn!(url = %url, error = %e, "Could not trust host");
                    self.opener.open(url)?;
                    return Ok(GateOutcome::Opened);
                }
                self.opener.open(url)?;
                Ok(GateOutcome::OpenedAndTrusted)
            }
        }
    }

    /// Assesses `raw`, asks `prompt` when needed and opens the link.
    pub async fn navigate(
        &self,
        raw: &str,
        prompt: &dyn ConfirmationPrompt,
    ) -> Result<GateOutcome, GateError> {
        match self.assess(raw) {
            LinkAssessment::Open(url) => {
                self.opener.open(&url)?;
                Ok(GateOutcome::Opened)
            }
            LinkAssessment::Confirm { url, risk } => {
                let choice = prompt.confirm(&url, risk).await;
                self.apply_choice(&url, risk, choice).await
            }
            LinkAssessment::Reject { reason } => {
                tracing::info!(url = %raw, reason = %reason, "Link rejected");
                Ok(GateOutcome::Rejected)
            }
        }
    }
}
