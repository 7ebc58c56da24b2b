/// alert-relay - Delivers alerts to third-party outputs
///
/// This library routes alerts produced by an upstream rule engine to issue
/// trackers, chat channels and paging services. Each destination is named by
/// a `service:identifier` descriptor and has its own encrypted credentials.
pub mod cli;
pub mod config;
pub mod core;
pub mod credentials;
pub mod descriptor;
pub mod dispatcher;
pub mod formatting;
pub mod outputs;
pub mod registry;
pub mod services;

// Re-export core types for convenience
pub use crate::core::*;
pub use crate::descriptor::OutputDescriptor;
pub use crate::dispatcher::{DispatchError, OutputDispatcher, RetryPolicy};
pub use crate::registry::OutputRegistry;
