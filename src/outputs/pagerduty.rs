//! Triggers PagerDuty incidents through the Events API v2.

use super::{join_url, send_request};
use crate::core::{Alert, OutputAdapter, SendError, SendOutcome};
use crate::credentials::CredentialBundle;
use crate::formatting::summary;
use async_trait::async_trait;
use serde_json::{json, Value};

pub const DEFAULT_EVENTS_URL: &str = "https://events.pagerduty.com";

/// Paging service output.
///
/// Credentials: `routing_key` (integration key), and optionally `api` to
/// override the events endpoint host.
#[derive(Debug, Default, Clone, Copy)]
pub struct PagerDutyOutput;

impl PagerDutyOutput {
    pub const SERVICE: &'static str = "pagerduty";

    fn event(alert: &Alert, routing_key: &str) -> Value {
        json!({
            "routing_key": routing_key,
            "event_action": "trigger",
            "dedup_key": alert.id,
            "payload": {
                "summary": summary(alert),
                "source": alert.log_source.as_deref().unwrap_or("alert-relay"),
                "severity": "critical",
                "timestamp": alert.created.to_rfc3339(),
                "custom_details": {
                    "rule_name": alert.rule_name,
                    "rule_description": alert.rule_description,
                    "record": alert.record,
                },
            },
        })
    }
}

#[async_trait]
impl OutputAdapter for PagerDutyOutput {
    fn service(&self) -> &'static str {
        Self::SERVICE
    }

    fn required_credentials(&self) -> &'static [&'static str] {
        &["routing_key"]
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        alert: &Alert,
        credentials: &CredentialBundle,
    ) -> Result<SendOutcome, SendError> {
        let routing_key = credentials
            .get_str("routing_key")
            .ok_or_else(|| SendError::Request("missing pagerduty routing key".to_string()))?;
        let api = credentials.get_str("api").unwrap_or(DEFAULT_EVENTS_URL);

        let request = http
            .post(join_url(api, "v2/enqueue"))
            .json(&Self::event(alert, routing_key));
        send_request(request).await
    }
}
