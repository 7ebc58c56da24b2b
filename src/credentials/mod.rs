//! Encrypted, per-destination credential storage.
//!
//! Credentials are stored with envelope encryption: each `put` generates a
//! fresh data key, encrypts the serialized bundle with it, and stores the
//! ciphertext together with the data key wrapped by a key management service.
//! Nothing is cached; every `get` goes back to the blob store and the KMS so
//! rotated credentials take effect immediately.

pub mod blob;
pub mod envelope;
pub mod kms;
#[cfg(feature = "aws")]
pub mod aws;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::descriptor::OutputDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use zeroize::{Zeroize, Zeroizing};

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use envelope::EncryptedCredentialRecord;
pub use kms::{KeyManagementService, LocalKms};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    #[error("no credentials stored under '{0}'")]
    NotFound(String),

    /// The stored record failed an integrity, decryption or decoding check.
    #[error("stored credentials are corrupt: {0}")]
    Corrupt(String),

    #[error("credentials are missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("failed to encrypt credentials: {0}")]
    Encryption(String),

    #[error("key management service error: {0}")]
    KeyManagement(String),

    #[error("blob storage error: {0}")]
    Storage(String),

    #[error("credential store call timed out after {0:?}")]
    Timeout(Duration),
}

/// A single credential value: either a plain string or a list of strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialValue {
    Text(String),
    List(Vec<String>),
}

impl CredentialValue {
    fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }
}

impl From<&str> for CredentialValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CredentialValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for CredentialValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Decrypted credentials for one destination.
///
/// Values are zeroized on drop and never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBundle(BTreeMap<String, CredentialValue>);

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<CredentialValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<CredentialValue>) {
        if let Some(mut old) = self.0.insert(key.into(), value.into()) {
            zeroize_value(&mut old);
        }
    }

    pub fn get(&self, key: &str) -> Option<&CredentialValue> {
        self.0.get(key)
    }

    /// Returns a non-blank string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(CredentialValue::Text(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a list value. Strings are split on commas; blank items are dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = match self.0.get(key)? {
            CredentialValue::Text(s) => s.split(',').map(|item| item.trim().to_string()).collect(),
            CredentialValue::List(list) => list.iter().map(|item| item.trim().to_string()).collect(),
        };
        let items: Vec<String> = items.into_iter().filter(|item| !item.is_empty()).collect();
        if items.is_empty() {
            None
        } else {
            Some(items)
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Required keys that are absent or blank.
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|key| self.0.get(**key).map_or(true, CredentialValue::is_blank))
            .map(|key| key.to_string())
            .collect()
    }

    /// Fails with `MissingKeys` unless every required key is present.
    pub fn ensure_present(&self, required: &[&str]) -> Result<(), CredentialError> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CredentialError::MissingKeys(missing))
        }
    }
}

fn zeroize_value(value: &mut CredentialValue) {
    match value {
        CredentialValue::Text(s) => s.zeroize(),
        CredentialValue::List(items) => items.zeroize(),
    }
}

impl Drop for CredentialBundle {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            zeroize_value(value);
        }
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.keys().map(|key| (key, "<redacted>")))
            .finish()
    }
}

/// Stores and retrieves credential bundles keyed by output descriptor.
#[derive(Clone)]
pub struct CredentialStore {
    kms: Arc<dyn KeyManagementService>,
    blobs: Arc<dyn BlobStore>,
    timeout: Duration,
}

impl CredentialStore {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(kms: Arc<dyn KeyManagementService>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            kms,
            blobs,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bounds every call to the KMS and the blob store.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Encrypts and stores a bundle, replacing any existing record.
    #[instrument(skip_all, fields(output = %descriptor))]
    pub async fn put(
        &self,
        descriptor: &OutputDescriptor,
        bundle: &CredentialBundle,
    ) -> Result<(), CredentialError> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(bundle).map_err(|e| CredentialError::Encryption(e.to_string()))?,
        );
        let sealed = envelope::seal(&plaintext)?;
        let wrapped_key = self
            .bounded(self.kms.wrap_key(sealed.data_key.as_bytes()))
            .await?;
        let record = EncryptedCredentialRecord::new(&wrapped_key, sealed.ciphertext);
        let name = descriptor.storage_name();
        self.bounded(self.blobs.put(&name, record.to_bytes()?))
            .await?;
        debug!(name = %name, "Stored encrypted credentials");
        Ok(())
    }

    /// Fetches and decrypts the bundle for a descriptor.
    #[instrument(skip_all, fields(output = %descriptor))]
    pub async fn get(&self, descriptor: &OutputDescriptor) -> Result<CredentialBundle, CredentialError> {
        let name = descriptor.storage_name();
        let bytes = self
            .bounded(self.blobs.get(&name))
            .await?
            .ok_or_else(|| CredentialError::NotFound(name.clone()))?;
        let record = EncryptedCredentialRecord::from_bytes(&bytes)?;
        let data_key = Zeroizing::new(
            self.bounded(self.kms.unwrap_key(&record.wrapped_key()?))
                .await?,
        );
        let plaintext = envelope::open(&data_key, record.ciphertext())?;
        serde_json::from_slice(&plaintext).map_err(|e| CredentialError::Corrupt(e.to_string()))
    }

    /// Whether a record exists for the descriptor. Does not decrypt it.
    pub async fn exists(&self, descriptor: &OutputDescriptor) -> Result<bool, CredentialError> {
        Ok(self
            .bounded(self.blobs.get(&descriptor.storage_name()))
            .await?
            .is_some())
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CredentialError>
    where
        F: Future<Output = Result<T, CredentialError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CredentialError::Timeout(self.timeout))?
    }
}
