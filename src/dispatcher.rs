//! Dispatch of one alert to one output, with retry.
//!
//! The dispatcher owns everything that is the same for every destination:
//! descriptor parsing, adapter lookup, credential retrieval, the retry and
//! backoff loop, and the success/failure log messages. Adapters only build
//! the request and classify the response.

use crate::core::{Alert, OutputAdapter, SendError};
use crate::credentials::{CredentialBundle, CredentialError, CredentialStore};
use crate::descriptor::{DescriptorError, OutputDescriptor};
use crate::registry::{OutputRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    MalformedDescriptor(#[from] DescriptorError),

    #[error(transparent)]
    UnknownService(#[from] RegistryError),

    #[error("credentials not found: {0}")]
    CredentialsNotFound(String),

    #[error("credentials invalid: {0}")]
    CredentialsInvalid(String),

    #[error("credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    #[error("adapter could not build request: {0}")]
    InvalidRequest(String),

    #[error("send failed after {attempts} attempt(s): {reason}")]
    TransientSendFailure { attempts: u32, reason: String },

    #[error("dispatch interrupted by shutdown after {attempts} attempt(s)")]
    Shutdown { attempts: u32 },
}

impl DispatchError {
    /// Only provider and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientSendFailure { .. })
    }
}

impl From<CredentialError> for DispatchError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound(name) => Self::CredentialsNotFound(name),
            CredentialError::Corrupt(_) | CredentialError::MissingKeys(_) => {
                Self::CredentialsInvalid(err.to_string())
            }
            CredentialError::Encryption(_)
            | CredentialError::KeyManagement(_)
            | CredentialError::Storage(_)
            | CredentialError::Timeout(_) => Self::CredentialsUnavailable(err.to_string()),
        }
    }
}

/// `service` metric label for descriptors that failed to parse.
const INVALID_SERVICE_LABEL: &str = "invalid";
/// `service` metric label for services with no registered adapter.
const UNKNOWN_SERVICE_LABEL: &str = "unknown";

/// How many times to attempt a send, and how long to wait in between.
///
/// Every non-2xx response and every transport error is retried the same
/// way, including 4xx responses that no retry will fix.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per dispatch, including the first. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt
    pub initial_backoff_ms: u64,
    /// Upper bound for a single backoff delay
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

/// Delivers alerts to outputs named by `service:identifier` descriptors.
///
/// Holds no per-dispatch state; one instance can serve concurrent dispatches.
pub struct OutputDispatcher {
    registry: Arc<OutputRegistry>,
    credentials: CredentialStore,
    http: reqwest::Client,
    retry: RetryPolicy,
    shutdown_rx: Option<watch::Receiver<()>>,
}

impl OutputDispatcher {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a dispatcher with the default retry policy and request timeout.
    pub fn new(registry: Arc<OutputRegistry>, credentials: CredentialStore) -> reqwest::Result<Self> {
        Ok(Self {
            registry,
            credentials,
            http: Self::http_client(Self::DEFAULT_REQUEST_TIMEOUT)?,
            retry: RetryPolicy::default(),
            shutdown_rx: None,
        })
    }

    /// Builds the HTTP client shared by all adapters.
    pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("alert-relay/", env!("CARGO_PKG_VERSION")))
            .build()
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Aborts pending backoff sleeps once the shutdown channel fires.
    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<()>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    /// Sends an alert to one output.
    ///
    /// Returns `true` iff an attempt succeeded. Every failure, including
    /// routing and credential errors, is logged and reported as `false`.
    pub async fn dispatch(&self, alert: &Alert, descriptor: &str) -> bool {
        let (service, identifier, service_label) = match OutputDescriptor::parse(descriptor) {
            Ok(parsed) => (
                parsed.service().to_string(),
                parsed.identifier().to_string(),
                self.service_label(&parsed),
            ),
            Err(_) => {
                let (service, identifier) = OutputDescriptor::raw_parts(descriptor);
                (service.to_string(), identifier.to_string(), INVALID_SERVICE_LABEL.to_string())
            }
        };

        match self.try_dispatch(alert, descriptor).await {
            Ok(()) => {
                metrics::counter!("alerts_dispatched_total", "service" => service_label, "status" => "success")
                    .increment(1);
                info!(alert_id = %alert.id, "Successfully sent alert to {}:{}", service, identifier);
                true
            }
            Err(e) => {
                metrics::counter!("alerts_dispatched_total", "service" => service_label, "status" => "failure")
                    .increment(1);
                error!(alert_id = %alert.id, error = %e, "Failed to send alert to {}:{}", service, identifier);
                false
            }
        }
    }

    /// Metric label for a parsed descriptor. Only registered service names
    /// are used as label values.
    fn service_label(&self, descriptor: &OutputDescriptor) -> String {
        match self.registry.resolve(descriptor.service()) {
            Ok(factory) => factory().service().to_string(),
            Err(_) => UNKNOWN_SERVICE_LABEL.to_string(),
        }
    }

    /// Like [`dispatch`](Self::dispatch) but returns the failure reason and
    /// logs nothing beyond per-attempt diagnostics.
    pub async fn try_dispatch(&self, alert: &Alert, descriptor: &str) -> Result<(), DispatchError> {
        let descriptor = OutputDescriptor::parse(descriptor)?;
        let adapter = (self.registry.resolve(descriptor.service())?)();
        let credentials = self.credentials.get(&descriptor).await?;
        credentials.ensure_present(adapter.required_credentials())?;

        self.send_with_retry(adapter.as_ref(), &descriptor, alert, &credentials)
            .await
    }

    /// Sends one alert to several outputs concurrently.
    ///
    /// Each output follows the single-dispatch contract independently.
    pub async fn dispatch_all<S: AsRef<str>>(&self, alert: &Alert, descriptors: &[S]) -> BTreeMap<String, bool> {
        let sends = descriptors.iter().map(|descriptor| async move {
            let descriptor = descriptor.as_ref();
            (descriptor.to_string(), self.dispatch(alert, descriptor).await)
        });
        futures::future::join_all(sends).await.into_iter().collect()
    }

    #[instrument(skip_all, fields(output = %descriptor))]
    async fn send_with_retry(
        &self,
        adapter: &dyn OutputAdapter,
        descriptor: &OutputDescriptor,
        alert: &Alert,
        credentials: &CredentialBundle,
    ) -> Result<(), DispatchError> {
        let attempts = self.retry.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            metrics::counter!("dispatch_attempts_total", "service" => adapter.service()).increment(1);

            match adapter.send(&self.http, alert, credentials).await {
                Ok(outcome) if outcome.status.is_success() => {
                    debug!(attempt, status = outcome.http_status, "Provider accepted alert");
                    return Ok(());
                }
                Ok(outcome) => {
                    warn!(attempt, status = outcome.http_status, body = %outcome.body, "Provider rejected alert");
                    last_error = format!("status {}: {}", outcome.http_status, outcome.body);
                }
                Err(SendError::Transport(e)) => {
                    // Webhook URLs carry secrets; keep them out of logs.
                    let e = e.without_url();
                    warn!(attempt, error = %e, "Transport error while sending alert");
                    last_error = e.to_string();
                }
                Err(SendError::Request(reason)) => {
                    return Err(DispatchError::InvalidRequest(reason));
                }
            }

            if attempt < attempts {
                let delay = self.retry.backoff(attempt);
                debug!(backoff_ms = delay.as_millis() as u64, "Retrying after backoff");
                if !self.backoff(delay).await {
                    warn!(attempt, "Shutdown requested, abandoning retries");
                    return Err(DispatchError::Shutdown { attempts: attempt });
                }
            }
        }

        Err(DispatchError::TransientSendFailure {
            attempts,
            reason: last_error,
        })
    }

    /// Sleeps for `delay`. Returns `false` if shutdown was signalled first.
    async fn backoff(&self, delay: Duration) -> bool {
        let Some(shutdown_rx) = &self.shutdown_rx else {
            sleep(delay).await;
            return true;
        };

        // A dropped sender disables the shutdown branch; the sleep still runs.
        let mut shutdown_rx = shutdown_rx.clone();
        let timer = sleep(delay);
        tokio::pin!(timer);
        tokio::select! {
            biased;
            Ok(()) = shutdown_rx.changed() => false,
            _ = &mut timer => true,
        }
    }
}
