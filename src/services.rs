//! Encapsulation for setting up external services.

use crate::{
    config::{CredentialBackend, CredentialsConfig, Config},
    credentials::{CredentialStore, FsBlobStore, LocalKms},
    dispatcher::OutputDispatcher,
    registry::OutputRegistry,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Builds the credential store for the configured backend.
pub async fn setup_credential_store(config: &CredentialsConfig) -> Result<CredentialStore> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let store = match config.backend {
        CredentialBackend::Local => {
            let kms = LocalKms::load_or_generate(&config.master_key_path)
                .with_context(|| format!("loading master key {}", config.master_key_path.display()))?;
            info!(dir = %config.local_dir.display(), "Using local credential store.");
            CredentialStore::new(Arc::new(kms), Arc::new(FsBlobStore::new(&config.local_dir)))
        }
        CredentialBackend::Aws => setup_aws_store(config).await?,
    };
    Ok(store.with_timeout(timeout))
}

#[cfg(feature = "aws")]
async fn setup_aws_store(config: &CredentialsConfig) -> Result<CredentialStore> {
    use crate::credentials::aws::{load_sdk_config, AwsKms, S3BlobStore};

    let bucket = config
        .bucket
        .as_deref()
        .context("credentials.bucket is required for the aws backend")?;
    let key_id = config
        .kms_key_id
        .as_deref()
        .context("credentials.kms_key_id is required for the aws backend")?;

    let sdk_config = load_sdk_config(config.region.as_deref()).await;
    info!(bucket = %bucket, "Using AWS credential store.");
    Ok(CredentialStore::new(
        Arc::new(AwsKms::new(&sdk_config, key_id)),
        Arc::new(S3BlobStore::new(&sdk_config, bucket, config.prefix.as_deref())),
    ))
}

#[cfg(not(feature = "aws"))]
async fn setup_aws_store(_config: &CredentialsConfig) -> Result<CredentialStore> {
    anyhow::bail!("the aws credential backend requires building with `--features aws`")
}

/// Wires the registry, credential store and retry policy into a dispatcher.
pub async fn setup_dispatcher(
    config: &Config,
    registry: Arc<OutputRegistry>,
    shutdown_rx: watch::Receiver<()>,
) -> Result<OutputDispatcher> {
    let store = setup_credential_store(&config.credentials).await?;
    let http = OutputDispatcher::http_client(Duration::from_secs(config.dispatch.request_timeout_secs))
        .context("building HTTP client")?;

    Ok(OutputDispatcher::new(registry, store)?
        .with_http_client(http)
        .with_retry_policy(config.dispatch.retry_policy())
        .with_shutdown(shutdown_rx))
}
