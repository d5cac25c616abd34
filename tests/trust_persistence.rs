//! Integration tests for the trusted-domain list and the link gate.
//!
//! Persistence tests use an on-disk SQLite file so the list is read back by a
//! fresh policy after the first database handle is dropped.

use async_trait::async_trait;
use murmur::storage::{Database, KeyValueStore};
use murmur::trust::{
    ConfirmChoice, ConfirmationPrompt, GateError, GateOutcome, LinkGate, LinkOpener, LinkRisk,
    TrustPolicy, TRUSTED_DOMAINS_KEY,
};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;

fn db_path(dir: &TempDir) -> String {
    dir.path().join("murmur.db").to_string_lossy().into_owned()
}

async fn open_policy(path: &str) -> Arc<TrustPolicy> {
    let db = Database::open(path).await.unwrap();
    Arc::new(TrustPolicy::load(Arc::new(db)).await)
}

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

impl LinkOpener for RecordingOpener {
    fn open(&self, url: &Url) -> Result<(), GateError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

struct FixedPrompt {
    choice: ConfirmChoice,
    asked: Mutex<Vec<LinkRisk>>,
}

impl FixedPrompt {
    fn new(choice: ConfirmChoice) -> Self {
        Self {
            choice,
            asked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConfirmationPrompt for FixedPrompt {
    async fn confirm(&self, _url: &Url, risk: LinkRisk) -> ConfirmChoice {
        self.asked.lock().unwrap().push(risk);
        self.choice
    }
}

#[tokio::test]
async fn test_added_domain_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);

    {
        let policy = open_policy(&path).await;
        assert!(!policy.is_trusted("https://cdn.example.org/a.png"));
        assert!(policy.add_trusted_domain("Example.org").await.unwrap());
        // Second add is a no-op
        assert!(!policy.add_trusted_domain("example.org").await.unwrap());
    }

    let policy = open_policy(&path).await;
    assert!(policy.is_trusted("https://cdn.example.org/a.png"));
    assert_eq!(policy.user_domains(), vec!["example.org".to_string()]);
}

#[tokio::test]
async fn test_trust_permanently_persists_through_gate() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);

    {
        let opener = Arc::new(RecordingOpener::default());
        let gate = LinkGate::new(open_policy(&path).await, opener.clone());
        let prompt = FixedPrompt::new(ConfirmChoice::TrustDomainPermanently);

        let outcome = gate
            .navigate("https://news.example.net/story", &prompt)
            .await
            .unwrap();
        assert_eq!(outcome, GateOutcome::OpenedAndTrusted);
        assert_eq!(*prompt.asked.lock().unwrap(), vec![LinkRisk::UntrustedDomain]);
        assert_eq!(opener.opened.lock().unwrap().len(), 1);
    }

    // After a restart the same host opens without a prompt
    let opener = Arc::new(RecordingOpener::default());
    let gate = LinkGate::new(open_policy(&path).await, opener.clone());
    let prompt = FixedPrompt::new(ConfirmChoice::Cancel);
    let outcome = gate
        .navigate("https://news.example.net/other", &prompt)
        .await
        .unwrap();
    assert_eq!(outcome, GateOutcome::Opened);
    assert!(prompt.asked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unsafe_host_is_never_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);
    let db = Arc::new(Database::open(&path).await.unwrap());
    let policy = Arc::new(TrustPolicy::load(db.clone()).await);
    let opener = Arc::new(RecordingOpener::default());
    let gate = LinkGate::new(policy.clone(), opener.clone());
    let prompt = FixedPrompt::new(ConfirmChoice::TrustDomainPermanently);

    let outcome = gate.navigate("http://127.0.0.1:8080/admin", &prompt).await.unwrap();

    assert_eq!(outcome, GateOutcome::Opened);
    assert_eq!(*prompt.asked.lock().unwrap(), vec![LinkRisk::FlaggedUnsafe]);
    assert!(policy.user_domains().is_empty());
    assert!(db.get(TRUSTED_DOMAINS_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_opens_nothing() {
    let opener = Arc::new(RecordingOpener::default());
    let gate = LinkGate::new(Arc::new(TrustPolicy::in_memory().await), opener.clone());
    let prompt = FixedPrompt::new(ConfirmChoice::Cancel);

    let outcome = gate.navigate("https://evil.test/x", &prompt).await.unwrap();
    assert_eq!(outcome, GateOutcome::Cancelled);
    assert!(opener.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_stored_list_falls_back_to_defaults() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    db.set(TRUSTED_DOMAINS_KEY, "[not json").await.unwrap();

    let policy = TrustPolicy::load(db).await;
    assert!(policy.user_domains().is_empty());
    assert!(policy.is_trusted("https://media.tenor.com/x.gif"));
}

proptest! {
    /// A host is trusted by an added domain exactly when the host ends with it.
    #[test]
    fn prop_suffix_match(
        label in "[a-z]{1,8}",
        domain in "[a-z]{1,8}\\.(test|example)",
        other in "[a-z]{1,8}\\.invalid",
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (sub, bare, unrelated) = rt.block_on(async {
            let policy = TrustPolicy::load_with_seed(
                Arc::new(murmur::storage::MemoryStore::new()),
                std::iter::empty(),
            )
            .await;
            policy.add_trusted_domain(&domain).await.unwrap();
            (
                policy.is_trusted(&format!("https://{}.{}/p", label, domain)),
                policy.is_trusted(&format!("https://{}/p", domain)),
                policy.is_trusted(&format!("https://{}/p", other)),
            )
        });
        prop_assert!(sub);
        prop_assert!(bare);
        prop_assert!(!unrelated);
    }
}
