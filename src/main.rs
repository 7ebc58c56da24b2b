//! alert-relay - delivers alerts to third-party outputs.

use alert_relay::{
    cli::{Cli, Command},
    config::Config,
    core::Alert,
    credentials::CredentialBundle,
    descriptor::OutputDescriptor,
    registry::OutputRegistry,
    services::{setup_credential_store, setup_dispatcher},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });
    init_logging(&config);

    let registry = Arc::new(OutputRegistry::with_default_outputs());

    match cli.command.clone().unwrap_or(Command::ListOutputs) {
        Command::ListOutputs => {
            for service in registry.services() {
                let adapter = (registry.resolve(service)?)();
                println!("{}: {}", service, adapter.required_credentials().join(", "));
            }
            Ok(())
        }
        Command::PutCredentials { descriptor, from } => {
            put_credentials(&config, &registry, &descriptor, &from).await
        }
        Command::Send { alert, descriptors } => {
            send(&config, registry, &alert, &descriptors).await
        }
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn put_credentials(
    config: &Config,
    registry: &OutputRegistry,
    descriptor: &str,
    from: &Path,
) -> Result<()> {
    let descriptor = OutputDescriptor::parse(descriptor)?;
    let adapter = (registry.resolve(descriptor.service())?)();

    let contents = tokio::fs::read_to_string(from)
        .await
        .with_context(|| format!("reading {}", from.display()))?;
    let bundle: CredentialBundle =
        serde_json::from_str(&contents).context("credential file must be a JSON object")?;
    bundle.ensure_present(adapter.required_credentials())?;

    let store = setup_credential_store(&config.credentials).await?;
    store.put(&descriptor, &bundle).await?;
    info!(output = %descriptor, "Stored credentials.");
    Ok(())
}

async fn send(
    config: &Config,
    registry: Arc<OutputRegistry>,
    alert_path: &Path,
    descriptors: &[String],
) -> Result<()> {
    let contents = tokio::fs::read_to_string(alert_path)
        .await
        .with_context(|| format!("reading {}", alert_path.display()))?;
    let alert: Alert = serde_json::from_str(&contents).context("alert file is not a valid alert")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, abandoning pending retries.");
            let _ = shutdown_tx.send(());
        }
    });

    let dispatcher = setup_dispatcher(config, registry, shutdown_rx).await?;
    let results = dispatcher.dispatch_all(&alert, descriptors).await;

    let failed: Vec<&String> = results
        .iter()
        .filter(|(_, sent)| !**sent)
        .map(|(descriptor, _)| descriptor)
        .collect();
    if !failed.is_empty() {
        error!(failed = ?failed, "Some outputs did not receive the alert.");
        bail!("failed to send alert to {} of {} outputs", failed.len(), results.len());
    }
    Ok(())
}
