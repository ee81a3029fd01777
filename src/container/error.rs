//! Errors raised while registering and resolving providers.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Error type returned by fallible providers and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building the component graph.
///
/// Every variant except `ConstructorFailure` is detected before any
/// constructor runs.
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// Two providers claim the same output type.
    #[error("type {type_name} is already provided by {existing}")]
    DuplicateProvider {
        type_name: &'static str,
        existing: String,
    },

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A provider requires a type that nothing produces.
    #[error("missing provider for {type_name} (required by {required_by})")]
    MissingProvider {
        type_name: &'static str,
        required_by: String,
    },

    /// A constructor returned an error; resolution was aborted.
    #[error("provider {provider} failed: {source}")]
    ConstructorFailure {
        provider: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A capability group was used with two different interface types.
    #[error("group {group} is bound to {expected}, not {found}")]
    GroupTypeMismatch {
        group: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// More than one provider consumes the same capability group.
    #[error("group {group} is consumed by both {first} and {second}")]
    DuplicateAggregator {
        group: &'static str,
        first: String,
        second: String,
    },
}

impl ContainerError {
    pub(crate) fn constructor(provider: &str, source: BoxError) -> Self {
        ContainerError::ConstructorFailure {
            provider: provider.to_string(),
            source: Arc::from(source),
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
