//! Parsing of `service:identifier` routing keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("malformed output descriptor '{0}': expected 'service:identifier'")]
    Malformed(String),
}

/// Names one configured delivery destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputDescriptor {
    service: String,
    identifier: String,
}

impl OutputDescriptor {
    /// Parses a routing key, splitting on the first `:`.
    ///
    /// Both halves are trimmed and must be non-empty. Anything after the
    /// first colon belongs to the identifier.
    pub fn parse(raw: &str) -> Result<Self, DescriptorError> {
        let (service, identifier) = raw
            .split_once(':')
            .ok_or_else(|| DescriptorError::Malformed(raw.to_string()))?;
        let service = service.trim();
        let identifier = identifier.trim();
        if service.is_empty() || identifier.is_empty() {
            return Err(DescriptorError::Malformed(raw.to_string()));
        }
        Ok(Self {
            service: service.to_string(),
            identifier: identifier.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The name under which this destination's credentials are stored.
    ///
    /// Always exactly two `/`-separated segments. Each half is lowercased and
    /// percent-encoded, so identifiers containing `:` or `/` stay inside their
    /// own segment.
    pub fn storage_name(&self) -> String {
        format!(
            "{}/{}",
            storage_segment(&self.service),
            storage_segment(&self.identifier)
        )
    }

    /// Best-effort (service, identifier) split of a raw string, for logging
    /// descriptors that failed to parse.
    pub fn raw_parts(raw: &str) -> (&str, &str) {
        raw.split_once(':').unwrap_or((raw, ""))
    }
}

fn storage_segment(part: &str) -> String {
    let encoded = urlencoding::encode(&part.to_lowercase()).into_owned();
    match encoded.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => encoded,
    }
}

impl FromStr for OutputDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.identifier)
    }
}
