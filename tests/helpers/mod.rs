#![allow(dead_code)]
//! Shared fixtures for the dispatch integration tests.

pub mod test_metrics;

use alert_relay::core::Alert;
use alert_relay::credentials::test_utils::{CountingBlobStore, CountingKms};
use alert_relay::credentials::{CredentialBundle, CredentialStore, LocalKms, MemoryBlobStore};
use alert_relay::{OutputDescriptor, OutputDispatcher, OutputRegistry, RetryPolicy};
use std::sync::Arc;

/// Retries quickly so multi-attempt tests stay fast.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

pub fn get_alert() -> Alert {
    Alert::new("79192344-4a6d-4850-8d06-9c3fef1060a4", "cloudtrail_root_account_usage")
        .with_description("Info about this rule and what actions to take")
        .with_field("eventName", "ConsoleLogin")
        .with_field("userIdentity", serde_json::json!({"type": "Root"}))
}

pub fn github_creds(api: &str) -> CredentialBundle {
    CredentialBundle::new()
        .with("username", "u")
        .with("access_token", "t")
        .with("repository", "org/repo")
        .with("labels", "a,b")
        .with("api", api)
}

/// A dispatcher over an in-memory credential store with call counters.
pub struct TestHarness {
    pub dispatcher: OutputDispatcher,
    pub store: CredentialStore,
    pub blobs: Arc<CountingBlobStore>,
    pub kms: Arc<CountingKms>,
}

impl TestHarness {
    pub fn new(retry: RetryPolicy) -> Self {
        Self::with_registry(retry, OutputRegistry::with_default_outputs())
    }

    pub fn with_registry(retry: RetryPolicy, registry: OutputRegistry) -> Self {
        let blobs = Arc::new(CountingBlobStore::new(Arc::new(MemoryBlobStore::new())));
        let kms = Arc::new(CountingKms::new(Arc::new(LocalKms::ephemeral())));
        let store = CredentialStore::new(kms.clone(), blobs.clone());
        let dispatcher = OutputDispatcher::new(Arc::new(registry), store.clone())
            .expect("failed to build dispatcher")
            .with_retry_policy(retry);

        Self {
            dispatcher,
            store,
            blobs,
            kms,
        }
    }

    pub async fn put_mock_creds(&self, descriptor: &str, creds: &CredentialBundle) {
        let descriptor = OutputDescriptor::parse(descriptor).unwrap();
        self.store.put(&descriptor, creds).await.unwrap();
    }
}
