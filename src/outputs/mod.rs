//! Output adapters for the supported destinations.
//!
//! Each adapter builds one provider request per call and classifies the
//! response with [`send_request`]. Retry and logging happen in the dispatcher.

pub mod github;
pub mod pagerduty;
pub mod slack;

pub use github::GithubOutput;
pub use pagerduty::PagerDutyOutput;
pub use slack::SlackOutput;

use crate::core::{DeliveryStatus, SendError, SendOutcome};
use serde_json::Value;

/// Performs the request and captures status and body.
///
/// The body is parsed as JSON when possible and kept as a string otherwise.
/// A body that fails to download does not change the classification, since
/// the status line already arrived; the read error is recorded in its place.
pub(crate) async fn send_request(request: reqwest::RequestBuilder) -> Result<SendOutcome, SendError> {
    let response = request.send().await?;
    let status = response.status();
    let body = match response.text().await {
        Ok(text) if text.trim().is_empty() => Value::Null,
        Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Err(e) => Value::String(format!("<unreadable response body: {}>", e.without_url())),
    };

    Ok(SendOutcome {
        status: DeliveryStatus::from_http(status),
        http_status: status.as_u16(),
        body,
    })
}

/// Joins a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
