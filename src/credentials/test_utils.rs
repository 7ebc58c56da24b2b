use super::{BlobStore, CredentialError, KeyManagementService};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Blob store wrapper that counts calls and can be switched to fail.
pub struct CountingBlobStore {
    inner: Arc<dyn BlobStore>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    fail: AtomicBool,
}

impl CountingBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call return a storage error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CredentialError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(CredentialError::Storage("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(name).await
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), CredentialError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.put(name, data).await
    }
}

/// KMS wrapper that counts wrap and unwrap calls.
pub struct CountingKms {
    inner: Arc<dyn KeyManagementService>,
    wraps: AtomicUsize,
    unwraps: AtomicUsize,
}

impl CountingKms {
    pub fn new(inner: Arc<dyn KeyManagementService>) -> Self {
        Self {
            inner,
            wraps: AtomicUsize::new(0),
            unwraps: AtomicUsize::new(0),
        }
    }

    pub fn wrap_count(&self) -> usize {
        self.wraps.load(Ordering::SeqCst)
    }

    pub fn unwrap_count(&self) -> usize {
        self.unwraps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyManagementService for CountingKms {
    async fn wrap_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, CredentialError> {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        self.inner.wrap_key(plaintext).await
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CredentialError> {
        self.unwraps.fetch_add(1, Ordering::SeqCst);
        self.inner.unwrap_key(wrapped).await
    }
}

/// A blob store whose calls never complete, for exercising timeouts.
pub struct StalledBlobStore;

#[async_trait]
impl BlobStore for StalledBlobStore {
    async fn get(&self, _name: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        std::future::pending().await
    }

    async fn put(&self, _name: &str, _data: Vec<u8>) -> Result<(), CredentialError> {
        std::future::pending().await
    }
}
