//! Error types for plumbline
//!
//! Centralized error handling using thiserror. `PlumblineError` is a run-level
//! failure ("validation could not run"); findings about instances are never
//! errors and only ever appear inside a report.

use std::fmt;

use thiserror::Error;

use crate::instance::SourceRef;

/// Which plugin hook was executing when a fault occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    PreProcess,
    Process,
    PostProcess,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::PreProcess => "pre_process",
            Hook::Process => "process",
            Hook::PostProcess => "post_process",
        };
        f.write_str(name)
    }
}

/// All run-level errors that can occur in plumbline
#[derive(Debug, Error)]
pub enum PlumblineError {
    /// Invalid target class, missing artifact, malformed plugin settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A `pre_process` or `post_process` hook failed
    #[error("Plugin '{plugin}' failed in {hook}: {source}")]
    Lifecycle {
        plugin: String,
        hook: Hook,
        #[source]
        source: PluginError,
    },

    /// A `process` fault escalated under the abort policy
    #[error("Plugin '{plugin}' failed in {hook} on instance {instance}: {source}")]
    InstanceFault {
        plugin: String,
        hook: Hook,
        instance: SourceRef,
        #[source]
        source: PluginError,
    },

    /// An input record could not be turned into an instance
    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    /// Invalid lifecycle transition or session operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by plugin code
#[derive(Debug, Error)]
pub enum PluginError {
    /// Free-form failure reported by a plugin
    #[error("{0}")]
    Failed(String),

    /// An artifact the plugin relies on was absent or of the wrong type
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// A yielded result was attributed to a different instance
    #[error("Result attributed to instance {found} while processing {expected}")]
    SourceMismatch { expected: SourceRef, found: SourceRef },

    /// A cross-instance finding was attributed to an instance this run never processed
    #[error("Result attributed to unknown instance {0}")]
    UnknownSource(SourceRef),

    /// Scratch space access failed
    #[error(transparent)]
    Scratch(#[from] ScratchError),
}

impl PluginError {
    pub fn failed(message: impl Into<String>) -> Self {
        PluginError::Failed(message.into())
    }
}

/// Errors raised by run-scoped scratch space
#[derive(Debug, Error)]
pub enum ScratchError {
    /// Scratch space was touched before any `pre_process` hook ran
    #[error("Scratch space is not open yet")]
    NotOpen,

    /// A stored value could not be converted
    #[error("Scratch value for '{key}' is invalid: {source}")]
    Value {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// `append` was used on a key holding something other than an array
    #[error("Scratch value for '{0}' is not an array")]
    NotAnArray(String),
}

/// Result type alias for plumbline operations
pub type Result<T> = std::result::Result<T, PlumblineError>;

/// Result type alias for plugin hooks
pub type PluginResult<T> = std::result::Result<T, PluginError>;
