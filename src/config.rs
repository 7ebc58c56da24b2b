//! Configuration management for alert-relay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from an `alert-relay.toml` file and merge it
//! with environment variables and command-line overrides.

use crate::cli::Cli;
use crate::dispatcher::RetryPolicy;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,
    /// Retry and timeout settings for dispatch.
    pub dispatch: DispatchConfig,
    /// Where and how credentials are stored.
    pub credentials: CredentialsConfig,
}

/// Retry and timeout settings for dispatch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Attempts per dispatch, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt, doubled on each further attempt.
    pub initial_backoff_ms: u64,
    /// Cap for a single backoff delay.
    pub max_backoff_ms: u64,
    /// Timeout for one provider request.
    pub request_timeout_secs: u64,
}

impl DispatchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff_ms: self.initial_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
        }
    }
}

/// Credential store backend.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// Files on disk, data keys wrapped by a local master key.
    Local,
    /// S3 objects, data keys wrapped by AWS KMS. Requires the `aws` feature.
    Aws,
}

/// Configuration for the credential store.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CredentialsConfig {
    pub backend: CredentialBackend,
    /// Root directory for records (local backend).
    pub local_dir: PathBuf,
    /// Master key file (local backend). Generated on first use.
    pub master_key_path: PathBuf,
    /// S3 bucket holding records (aws backend).
    pub bucket: Option<String>,
    /// Key prefix inside the bucket (aws backend).
    pub prefix: Option<String>,
    /// KMS key id, ARN or alias (aws backend).
    pub kms_key_id: Option<String>,
    /// AWS region; the SDK default chain is used when unset.
    pub region: Option<String>,
    /// Timeout for a single KMS or storage call.
    pub timeout_secs: u64,
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file, the
    /// environment, and command-line arguments (highest precedence).
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(config_path) = &cli.config {
            figment = figment.merge(Toml::file(config_path));
        }

        let config: Config = figment
            // e.g., ALERT_RELAY_DISPATCH__MAX_ATTEMPTS=3
            .merge(Env::prefixed("ALERT_RELAY_").split("__"))
            .merge(cli)
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make dispatch misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.max_attempts == 0 {
            bail!("dispatch.max_attempts must be at least 1");
        }
        if self.dispatch.initial_backoff_ms > self.dispatch.max_backoff_ms {
            bail!("dispatch.initial_backoff_ms must not exceed dispatch.max_backoff_ms");
        }
        if self.dispatch.request_timeout_secs == 0 || self.credentials.timeout_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.credentials.backend == CredentialBackend::Aws {
            if self.credentials.bucket.is_none() {
                bail!("credentials.bucket is required for the aws backend");
            }
            if self.credentials.kms_key_id.is_none() {
                bail!("credentials.kms_key_id is required for the aws backend");
            }
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            log_level: "info".to_string(),
            log_json: false,
            dispatch: DispatchConfig {
                max_attempts: retry.max_attempts,
                initial_backoff_ms: retry.initial_backoff_ms,
                max_backoff_ms: retry.max_backoff_ms,
                request_timeout_secs: 10,
            },
            credentials: CredentialsConfig {
                backend: CredentialBackend::Local,
                local_dir: PathBuf::from(".alert-relay/credentials"),
                master_key_path: PathBuf::from(".alert-relay/master.key"),
                bucket: None,
                prefix: None,
                kms_key_id: None,
                region: None,
                timeout_secs: 5,
            },
        }
    }
}
