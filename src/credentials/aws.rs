//! AWS backends for the credential store: KMS for key wrapping and S3 for
//! record storage. Enable with `--features aws`.
//!
//! Both clients use the default AWS credential provider chain.

use super::{BlobStore, CredentialError, KeyManagementService};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_s3::primitives::ByteStream;
use tracing::trace;

/// Loads the shared AWS configuration, optionally pinned to a region.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// AWS KMS key wrapping.
///
/// The key id travels inside the ciphertext blob, so unwrapping does not
/// need it.
pub struct AwsKms {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl AwsKms {
    /// `key_id` may be a key id, key ARN, or alias (e.g., `alias/alert-relay`).
    pub fn new(config: &SdkConfig, key_id: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_kms::Client::new(config),
            key_id: key_id.into(),
        }
    }
}

#[async_trait]
impl KeyManagementService for AwsKms {
    async fn wrap_key(&self, plaintext: &[u8]) -> Result<Vec<u8>, CredentialError> {
        trace!(key_id = %self.key_id, "wrapping data key with AWS KMS");
        let output = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(|e| CredentialError::KeyManagement(format!("KMS encrypt failed: {}", e)))?;

        output
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| CredentialError::KeyManagement("no ciphertext returned".to_string()))
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CredentialError> {
        trace!("unwrapping data key with AWS KMS");
        let output = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(wrapped))
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_invalid_ciphertext_exception() {
                    CredentialError::Corrupt(format!("KMS rejected ciphertext: {}", service_error))
                } else {
                    CredentialError::KeyManagement(format!("KMS decrypt failed: {}", service_error))
                }
            })?;

        output
            .plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| CredentialError::KeyManagement("no plaintext returned".to_string()))
    }
}

/// Stores records as objects in an S3 bucket under an optional prefix.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3BlobStore {
    pub fn new(config: &SdkConfig, bucket: impl Into<String>, prefix: Option<&str>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}/", p))
            .unwrap_or_default();
        Self {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.into(),
            prefix,
        }
    }

    fn object_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, CredentialError> {
        let key = self.object_key(name);
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Ok(None);
                }
                return Err(CredentialError::Storage(format!(
                    "S3 get s3://{}/{} failed: {}",
                    self.bucket, key, service_error
                )));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| CredentialError::Storage(format!("S3 body read failed: {}", e)))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), CredentialError> {
        let key = self.object_key(name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                CredentialError::Storage(format!("S3 put s3://{}/{} failed: {}", self.bucket, key, e))
            })?;
        Ok(())
    }
}
