//! Maps service names to output adapter constructors.
//!
//! The registry is filled once at startup and then shared read-only by
//! every dispatcher.

use crate::core::OutputAdapter;
use crate::outputs::{GithubOutput, PagerDutyOutput, SlackOutput};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no output adapter registered for service '{0}'")]
    UnknownService(String),
}

/// Constructs an adapter for one dispatch.
pub type AdapterFactory = Arc<dyn Fn() -> Box<dyn OutputAdapter> + Send + Sync>;

#[derive(Clone, Default)]
pub struct OutputRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl OutputRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every adapter this crate ships.
    pub fn with_default_outputs() -> Self {
        let mut registry = Self::new();
        registry.register(GithubOutput::SERVICE, || Box::new(GithubOutput));
        registry.register(SlackOutput::SERVICE, || Box::new(SlackOutput));
        registry.register(PagerDutyOutput::SERVICE, || Box::new(PagerDutyOutput));
        registry
    }

    /// Registers a factory, replacing any previous one for the same name.
    /// Service names are case-insensitive.
    pub fn register<F>(&mut self, service: &str, factory: F)
    where
        F: Fn() -> Box<dyn OutputAdapter> + Send + Sync + 'static,
    {
        self.factories
            .insert(service.to_lowercase(), Arc::new(factory));
    }

    pub fn resolve(&self, service: &str) -> Result<AdapterFactory, RegistryError> {
        self.factories
            .get(&service.to_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownService(service.to_string()))
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputRegistry")
            .field("services", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
