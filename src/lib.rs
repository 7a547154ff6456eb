//! plumbline - plugin-driven validation of structured data
//!
//! Instances are checked against a resolved schema by an ordered pipeline of
//! validation plugins. Each plugin lazily yields findings; the runner tags
//! them with their source instance and collects them into a report.

pub mod artifacts;
pub mod error;
pub mod instance;
pub mod plugins;
pub mod schema;
pub mod validation;

pub use error::{PluginError, PluginResult, PlumblineError, Result};
pub use instance::{Instance, SourceRef};
pub use schema::SchemaDefinition;
pub use validation::{
    FaultPolicy, Runner, Severity, ValidationContext, ValidationPlugin, ValidationReport,
    ValidationResult, ValidationResultWithSource,
};
