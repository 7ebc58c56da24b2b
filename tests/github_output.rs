//! End-to-end dispatch to the GitHub issue output.

use base64::Engine;
use serde_json::{json, Value};
use tracing_test::traced_test;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod helpers;
use helpers::{get_alert, github_creds, TestHarness};

const SERVICE: &str = "github";
const DESCRIPTOR: &str = "unit_test_repo";
const OUTPUT: &str = "github:unit_test_repo";

async fn setup(server: &MockServer) -> TestHarness {
    let harness = TestHarness::new(alert_relay::RetryPolicy::single_attempt());
    harness.put_mock_creds(OUTPUT, &github_creds(&server.uri())).await;
    harness
}

#[tokio::test]
#[traced_test]
async fn test_dispatch_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/org/repo/issues"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let harness = setup(&server).await;

    assert!(harness.dispatcher.dispatch(&get_alert(), OUTPUT).await);

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap();
    let encoded = auth.split(' ').last().unwrap();
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "u:t");
    assert!(auth.starts_with("Basic "));

    assert!(logs_contain(&format!(
        "Successfully sent alert to {}:{}",
        SERVICE, DESCRIPTOR
    )));
}

#[tokio::test]
#[traced_test]
async fn test_dispatch_success_with_labels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/org/repo/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let harness = setup(&server).await;

    assert!(harness.dispatcher.dispatch(&get_alert(), OUTPUT).await);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["labels"], json!(["a", "b"]));
    assert_eq!(body["title"], json!("cloudtrail_root_account_usage"));
    assert!(body["body"].as_str().unwrap().contains("ConsoleLogin"));
    assert!(logs_contain("Successfully sent alert to github:unit_test_repo"));
}

#[tokio::test]
async fn test_dispatch_success_without_labels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    let harness = TestHarness::new(alert_relay::RetryPolicy::single_attempt());
    let creds = alert_relay::credentials::CredentialBundle::new()
        .with("username", "u")
        .with("access_token", "t")
        .with("repository", "org/repo")
        .with("api", server.uri());
    harness.put_mock_creds(OUTPUT, &creds).await;

    assert!(harness.dispatcher.dispatch(&get_alert(), OUTPUT).await);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("labels").is_none());
}

#[tokio::test]
#[traced_test]
async fn test_dispatch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "error message", "errors": ["error1"]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let harness = setup(&server).await;

    assert!(!harness.dispatcher.dispatch(&get_alert(), OUTPUT).await);

    assert!(logs_contain(&format!(
        "Failed to send alert to {}:{}",
        SERVICE, DESCRIPTOR
    )));
    assert!(!logs_contain("Successfully sent alert"));
}

#[tokio::test]
#[traced_test]
async fn test_dispatch_bad_descriptor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let harness = setup(&server).await;

    assert!(
        !harness
            .dispatcher
            .dispatch(&get_alert(), &format!("{}:{}", SERVICE, "bad_descriptor"))
            .await
    );

    assert!(logs_contain("Failed to send alert to github:bad_descriptor"));
    // The record was looked up but nothing was decrypted.
    assert_eq!(harness.kms.unwrap_count(), 0);
}
