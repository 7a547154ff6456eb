//! Plugin execution protocol
//!
//! Context, results, the plugin contract, the runner that drives plugins
//! through a run, and the report it produces.

pub mod context;
pub mod plugin;
pub mod report;
pub mod result;
pub mod runner;

pub use context::{ScratchHandle, ValidationContext};
pub use plugin::{Findings, PluginState, ValidationPlugin, no_findings};
pub use report::{ReportBuilder, RunStatus, ValidationReport};
pub use result::{FieldPath, ResultKind, Severity, ValidationResult, ValidationResultWithSource};
pub use runner::{FaultPolicy, Runner, ValidationSession};
