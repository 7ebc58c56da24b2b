//! Blob storage for encrypted credential records.

use super::CredentialError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A key/value store of opaque blobs.
///
/// Writes to the same name are last-write-wins.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `Ok(None)` when nothing is stored under `name`.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, CredentialError>;

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), CredentialError>;
}

/// An in-process blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| CredentialError::Storage("blob store lock poisoned".to_string()))?;
        Ok(blobs.get(name).cloned())
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), CredentialError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| CredentialError::Storage("blob store lock poisoned".to_string()))?;
        blobs.insert(name.to_string(), data);
        Ok(())
    }
}

/// Stores each blob as a file below a root directory.
///
/// A name like `github/prod` maps to `<root>/github/prod`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, CredentialError> {
        let mut path = self.root.clone();
        for segment in name.split('/') {
            validate_segment(segment)?;
            path.push(segment);
        }
        Ok(path)
    }
}

/// A temp file next to `path`, unique per process and per write.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().map(OsString::from).unwrap_or_default();
    file_name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(file_name)
}

/// Rejects segments that could escape the root or are unportable as file names.
fn validate_segment(segment: &str) -> Result<(), CredentialError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%' | '@' | '+'));
    if valid {
        Ok(())
    } else {
        Err(CredentialError::Storage(format!(
            "invalid blob name segment '{}'",
            segment
        )))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CredentialError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), CredentialError> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CredentialError::Storage(e.to_string()))?;
        }
        // Write then rename so readers never observe a partial record.
        let tmp = tmp_path_for(&path);
        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CredentialError::Storage(format!(
                "failed to write {}: {}",
                tmp.display(),
                e
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CredentialError::Storage(format!(
                "failed to write {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}
