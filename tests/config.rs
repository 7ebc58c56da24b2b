use alert_relay::cli::Cli;
use alert_relay::config::{Config, CredentialBackend};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn cli_for(toml_content: &str) -> (NamedTempFile, Cli) {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    (file, cli)
}

#[test]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        log_json = true
        [dispatch]
        max_attempts = 3
        initial_backoff_ms = 250
        max_backoff_ms = 4000
        request_timeout_secs = 20
        [credentials]
        backend = "aws"
        local_dir = "/var/lib/alert-relay/creds"
        master_key_path = "/etc/alert-relay/master.key"
        bucket = "prod-alert-credentials"
        prefix = "outputs"
        kms_key_id = "alias/alert-relay"
        region = "us-east-1"
        timeout_secs = 2
    "#;
    let (_file, cli) = cli_for(toml_content);

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.log_level, "debug");
    assert!(config.log_json);
    assert_eq!(config.dispatch.max_attempts, 3);
    assert_eq!(config.dispatch.initial_backoff_ms, 250);
    assert_eq!(config.dispatch.max_backoff_ms, 4000);
    assert_eq!(config.dispatch.request_timeout_secs, 20);
    assert_eq!(config.credentials.backend, CredentialBackend::Aws);
    assert_eq!(
        config.credentials.local_dir,
        PathBuf::from("/var/lib/alert-relay/creds")
    );
    assert_eq!(
        config.credentials.bucket,
        Some("prod-alert-credentials".to_string())
    );
    assert_eq!(config.credentials.prefix, Some("outputs".to_string()));
    assert_eq!(
        config.credentials.kms_key_id,
        Some("alias/alert-relay".to_string())
    );
    assert_eq!(config.credentials.region, Some("us-east-1".to_string()));
    assert_eq!(config.credentials.timeout_secs, 2);

    let retry = config.dispatch.retry_policy();
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.initial_backoff_ms, 250);
}

#[test]
fn test_load_default_values() {
    let (_file, cli) = cli_for("");

    let config = Config::load(&cli).unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.dispatch.max_attempts, 5);
    assert_eq!(config.credentials.backend, CredentialBackend::Local);
}

#[test]
fn test_partial_section_keeps_defaults() {
    let toml_content = r#"
        [dispatch]
        max_attempts = 2
    "#;
    let (_file, cli) = cli_for(toml_content);

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.dispatch.max_attempts, 2);
    assert_eq!(config.dispatch.initial_backoff_ms, 500); // default
    assert_eq!(config.dispatch.max_backoff_ms, 10_000); // default
}

#[test]
fn test_cli_overrides_file() {
    let toml_content = r#"
        log_level = "warn"
        [dispatch]
        max_attempts = 3
    "#;
    let (_file, mut cli) = cli_for(toml_content);
    cli.max_attempts = Some(7);
    cli.log_level = Some("trace".to_string());

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.dispatch.max_attempts, 7);
    assert_eq!(config.log_level, "trace");
}

#[test]
fn test_invalid_value_type() {
    let toml_content = r#"
        [dispatch]
        max_attempts = "five"
    "#;
    let (_file, cli) = cli_for(toml_content);

    let config = Config::load(&cli);
    assert!(config.is_err());
}

#[test]
fn test_zero_attempts_rejected() {
    let toml_content = r#"
        [dispatch]
        max_attempts = 0
    "#;
    let (_file, cli) = cli_for(toml_content);

    let err = Config::load(&cli).unwrap_err();
    assert!(err.to_string().contains("max_attempts"));
}

#[test]
fn test_backoff_bounds_rejected() {
    let toml_content = r#"
        [dispatch]
        initial_backoff_ms = 5000
        max_backoff_ms = 100
    "#;
    let (_file, cli) = cli_for(toml_content);

    assert!(Config::load(&cli).is_err());
}

#[test]
fn test_aws_backend_requires_bucket_and_key() {
    let (_file, cli) = cli_for(
        r#"
        [credentials]
        backend = "aws"
        kms_key_id = "alias/alert-relay"
    "#,
    );
    let err = Config::load(&cli).unwrap_err();
    assert!(err.to_string().contains("bucket"));

    let (_file, cli) = cli_for(
        r#"
        [credentials]
        backend = "aws"
        bucket = "creds"
    "#,
    );
    let err = Config::load(&cli).unwrap_err();
    assert!(err.to_string().contains("kms_key_id"));
}

#[test]
fn test_unknown_backend_rejected() {
    let (_file, cli) = cli_for(
        r#"
        [credentials]
        backend = "vault"
    "#,
    );
    assert!(Config::load(&cli).is_err());
}
