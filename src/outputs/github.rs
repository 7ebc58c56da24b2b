//! Opens a GitHub issue per alert.

use super::{join_url, send_request};
use crate::core::{Alert, OutputAdapter, SendError, SendOutcome};
use crate::credentials::CredentialBundle;
use crate::formatting::{MarkdownFormatter, TextFormatter};
use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Serialize, PartialEq)]
struct IssueRequest {
    title: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

/// Issue tracker output.
///
/// Credentials: `username`, `access_token`, `repository` (`org/repo`), and
/// optionally `labels` (comma separated) and `api` (base URL for GitHub
/// Enterprise).
#[derive(Debug, Default, Clone, Copy)]
pub struct GithubOutput;

impl GithubOutput {
    pub const SERVICE: &'static str = "github";

    /// `Basic base64(username:access_token)`
    fn authorization(username: &str, access_token: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, access_token));
        format!("Basic {}", encoded)
    }

    fn issues_url(credentials: &CredentialBundle, repository: &str) -> String {
        let api = credentials.get_str("api").unwrap_or(DEFAULT_API_URL);
        join_url(api, &format!("repos/{}/issues", repository.trim_matches('/')))
    }

    fn issue(alert: &Alert, credentials: &CredentialBundle) -> IssueRequest {
        IssueRequest {
            title: alert.rule_name.clone(),
            body: MarkdownFormatter.format(alert),
            labels: credentials.get_list("labels"),
        }
    }
}

#[async_trait]
impl OutputAdapter for GithubOutput {
    fn service(&self) -> &'static str {
        Self::SERVICE
    }

    fn required_credentials(&self) -> &'static [&'static str] {
        &["username", "access_token", "repository"]
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        alert: &Alert,
        credentials: &CredentialBundle,
    ) -> Result<SendOutcome, SendError> {
        let (Some(username), Some(access_token), Some(repository)) = (
            credentials.get_str("username"),
            credentials.get_str("access_token"),
            credentials.get_str("repository"),
        ) else {
            return Err(SendError::Request("missing github credentials".to_string()));
        };

        let request = http
            .post(Self::issues_url(credentials, repository))
            .header(reqwest::header::AUTHORIZATION, Self::authorization(username, access_token))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&Self::issue(alert, credentials));

        send_request(request).await
    }
}
