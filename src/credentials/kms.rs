//! Key management: wrapping and unwrapping of per-record data keys.

use super::{envelope, CredentialError};
use age::secrecy::ExposeSecret;
use age::x25519;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, trace};

/// Wraps data keys under a key the caller never sees.
///
/// Implemented by AWS KMS (behind the `aws` feature) and by [`LocalKms`].
#[async_trait]
pub trait KeyManagementService: Send + Sync {
    /// Encrypts a data key.
    async fn wrap_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, CredentialError>;

    /// Decrypts a previously wrapped data key.
    ///
    /// Returns `CredentialError::Corrupt` when the wrapped key fails an
    /// integrity check, `KeyManagement` when the service itself failed.
    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CredentialError>;
}

/// Wraps data keys to a master age identity held on local disk.
///
/// Suitable for single-host deployments and development; the master key
/// file must be protected like any other secret.
pub struct LocalKms {
    master: x25519::Identity,
}

impl LocalKms {
    /// Uses a master identity that lives only as long as this value.
    pub fn ephemeral() -> Self {
        Self {
            master: x25519::Identity::generate(),
        }
    }

    /// Loads the master identity from `path`, generating it on first use.
    pub fn load_or_generate(path: &Path) -> Result<Self, CredentialError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                CredentialError::KeyManagement(format!("failed to read {}: {}", path.display(), e))
            })?;
            let master = contents.trim().parse().map_err(|e: &str| {
                CredentialError::KeyManagement(format!("invalid master key {}: {}", path.display(), e))
            })?;
            return Ok(Self { master });
        }

        let master = x25519::Identity::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CredentialError::KeyManagement(e.to_string()))?;
        }
        std::fs::write(path, format!("{}\n", master.to_string().expose_secret()))
            .map_err(|e| CredentialError::KeyManagement(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| CredentialError::KeyManagement(e.to_string()))?;
        }

        info!(path = %path.display(), "Generated new local master key");
        Ok(Self { master })
    }
}

#[async_trait]
impl KeyManagementService for LocalKms {
    async fn wrap_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, CredentialError> {
        trace!(len = plaintext.len(), "wrapping data key with local master key");
        envelope::encrypt(&self.master.to_public(), plaintext)
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CredentialError> {
        trace!(len = wrapped.len(), "unwrapping data key with local master key");
        envelope::decrypt(&self.master, wrapped).map(|plaintext| plaintext.to_vec())
    }
}
