//! Posts alerts to a Slack incoming webhook.

use super::send_request;
use crate::core::{Alert, OutputAdapter, SendError, SendOutcome};
use crate::credentials::CredentialBundle;
use crate::formatting::{SlackTextFormatter, TextFormatter};
use async_trait::async_trait;
use serde_json::json;

/// Chat channel output. The only credential is the webhook `url`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlackOutput;

impl SlackOutput {
    pub const SERVICE: &'static str = "slack";
}

#[async_trait]
impl OutputAdapter for SlackOutput {
    fn service(&self) -> &'static str {
        Self::SERVICE
    }

    fn required_credentials(&self) -> &'static [&'static str] {
        &["url"]
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        alert: &Alert,
        credentials: &CredentialBundle,
    ) -> Result<SendOutcome, SendError> {
        let webhook_url = credentials
            .get_str("url")
            .ok_or_else(|| SendError::Request("missing slack webhook url".to_string()))?;
        let payload = json!({ "text": SlackTextFormatter.format(alert) });

        send_request(http.post(webhook_url).json(&payload)).await
    }
}
