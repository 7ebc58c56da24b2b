//! Core domain types and service traits for alert-relay
//!
//! This module defines the alert record handed to us by the rule engine and
//! the trait contract every output adapter implements.

use crate::credentials::CredentialBundle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// An alert produced by the upstream rule engine.
///
/// Alerts are read-only to this crate: they are rendered into
/// provider-specific content and then dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    /// Unique identifier of the alert
    pub id: String,
    /// Name of the rule that fired
    pub rule_name: String,
    /// Free-form description of the rule, if the rule has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_description: Option<String>,
    /// Log source the triggering record came from (e.g., "cloudtrail:events")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_source: Option<String>,
    /// When the alert was created
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    /// The record that triggered the rule. Ordered so renderings are stable.
    #[serde(default)]
    pub record: BTreeMap<String, Value>,
}

impl Alert {
    /// Creates an alert with an empty record.
    pub fn new(id: impl Into<String>, rule_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rule_name: rule_name.into(),
            rule_description: None,
            log_source: None,
            created: Utc::now(),
            record: BTreeMap::new(),
        }
    }

    /// Adds a key/value pair to the record.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.record.insert(key.into(), value.into());
        self
    }

    /// Sets the rule description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.rule_description = Some(description.into());
        self
    }
}

/// The two outcomes a provider response can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Success,
    Failure,
}

impl DeliveryStatus {
    /// Conventional HTTP classification: 2xx is success, anything else is not.
    pub fn from_http(status: reqwest::StatusCode) -> Self {
        if status.is_success() {
            Self::Success
        } else {
            Self::Failure
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// What an adapter reports back for a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub status: DeliveryStatus,
    /// HTTP status code returned by the provider
    pub http_status: u16,
    /// Response body, parsed as JSON when possible
    pub body: Value,
}

/// Errors an adapter can raise during one attempt.
#[derive(Error, Debug)]
pub enum SendError {
    /// The request never produced a response (timeout, connection reset, ...)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request could not be built from the alert and credentials.
    #[error("failed to build request: {0}")]
    Request(String),
}

/// Translates an alert into a provider request and classifies the response.
///
/// Adapters perform exactly one network call per `send` and never log:
/// retry policy and the success/failure messages belong to the dispatcher.
#[async_trait]
pub trait OutputAdapter: Send + Sync {
    /// The registry key of this adapter (e.g., "github").
    fn service(&self) -> &'static str;

    /// Credential keys that must be present before a send is attempted.
    fn required_credentials(&self) -> &'static [&'static str];

    /// Builds the provider request and performs the network call.
    ///
    /// # Returns
    /// * `Ok(SendOutcome)` whenever the provider answered, regardless of status
    /// * `Err(SendError)` when no response was obtained
    async fn send(
        &self,
        http: &reqwest::Client,
        alert: &Alert,
        credentials: &CredentialBundle,
    ) -> Result<SendOutcome, SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_deserializes_with_defaults() {
        let alert: Alert = serde_json::from_value(json!({
            "id": "a-1",
            "rule_name": "root_login",
        }))
        .unwrap();

        assert_eq!(alert.id, "a-1");
        assert!(alert.record.is_empty());
        assert!(alert.rule_description.is_none());
    }

    #[test]
    fn test_delivery_status_from_http() {
        assert_eq!(
            DeliveryStatus::from_http(reqwest::StatusCode::CREATED),
            DeliveryStatus::Success
        );
        assert_eq!(
            DeliveryStatus::from_http(reqwest::StatusCode::MULTIPLE_CHOICES),
            DeliveryStatus::Failure
        );
        assert_eq!(
            DeliveryStatus::from_http(reqwest::StatusCode::BAD_REQUEST),
            DeliveryStatus::Failure
        );
    }
}
