//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the TOML file and environment variables.

use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Delivers alerts to issue trackers, chat channels and paging services.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Attempts per dispatch, including the first.
    #[arg(long, value_name = "N", global = true)]
    pub max_attempts: Option<u32>,

    /// Logging level (e.g., "debug").
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Encrypt and store credentials for an output.
    PutCredentials {
        /// Output descriptor, e.g. `github:prod_repo`.
        descriptor: String,
        /// JSON file with the credential fields.
        #[arg(long = "from", value_name = "FILE")]
        from: PathBuf,
    },
    /// Send an alert to one or more outputs.
    Send {
        /// JSON file containing the alert.
        alert: PathBuf,
        /// Output descriptors, e.g. `slack:ops`.
        #[arg(required = true)]
        descriptors: Vec<String>,
    },
    /// List the registered output services and their credential fields.
    ListOutputs,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(attempts) = self.max_attempts {
            let mut dispatch = Dict::new();
            dispatch.insert("max_attempts".into(), Value::from(attempts));
            dict.insert("dispatch".into(), Value::from(dispatch));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
