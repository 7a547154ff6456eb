//! The validation plugin contract

use std::fmt;

use crate::error::{PluginResult, PlumblineError, Result};
use crate::instance::Instance;
use crate::validation::context::ValidationContext;
use crate::validation::result::ValidationResultWithSource;

/// Lazy, single-pass sequence of findings produced by one `process` call.
///
/// An `Err` item means the plugin faulted midway; nothing after it is read.
pub type Findings<'a> = Box<dyn Iterator<Item = PluginResult<ValidationResultWithSource>> + 'a>;

/// A sequence with no findings
pub fn no_findings<'a>() -> Findings<'a> {
    Box::new(std::iter::empty())
}

/// An independently pluggable validation rule.
///
/// Only [`process`](Self::process) is mandatory. For every run the runner
/// calls `pre_process` once, `process` once per instance and `post_process`
/// once, in that order, even when the run has no instances.
pub trait ValidationPlugin {
    /// Stable identifier used for attribution and as the scratch namespace
    fn name(&self) -> &str;

    /// Artifact keys this plugin needs; a missing key fails the run before
    /// any hook is called
    fn required_artifacts(&self) -> &[&str] {
        &[]
    }

    /// Called once per run before any instance is processed
    fn pre_process(&mut self, _context: &ValidationContext) -> PluginResult<()> {
        Ok(())
    }

    /// Lazily yield findings for one instance.
    ///
    /// Must not compute results eagerly and must not assume the sequence is
    /// drained to the end. An empty sequence means no problems were found.
    fn process<'a>(
        &'a self,
        instance: &'a Instance,
        context: &'a ValidationContext,
    ) -> PluginResult<Findings<'a>>;

    /// Called once per run after every instance has been processed.
    ///
    /// May return cross-instance findings, attributed to whichever instance
    /// the plugin recorded as their cause.
    fn post_process(
        &mut self,
        _context: &ValidationContext,
    ) -> PluginResult<Vec<ValidationResultWithSource>> {
        Ok(Vec::new())
    }
}

impl<P: ValidationPlugin + ?Sized> ValidationPlugin for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn required_artifacts(&self) -> &[&str] {
        (**self).required_artifacts()
    }

    fn pre_process(&mut self, context: &ValidationContext) -> PluginResult<()> {
        (**self).pre_process(context)
    }

    fn process<'a>(
        &'a self,
        instance: &'a Instance,
        context: &'a ValidationContext,
    ) -> PluginResult<Findings<'a>> {
        (**self).process(instance, context)
    }

    fn post_process(
        &mut self,
        context: &ValidationContext,
    ) -> PluginResult<Vec<ValidationResultWithSource>> {
        (**self).post_process(context)
    }
}

/// Lifecycle position of one plugin within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Uninitialized,
    PreProcessed,
    /// Invoked for `n` instances so far
    Processing(usize),
    PostProcessed,
}

impl PluginState {
    /// Advance to the state reached after `pre_process`
    pub fn pre_processed(self) -> Result<Self> {
        match self {
            PluginState::Uninitialized => Ok(PluginState::PreProcessed),
            other => Err(other.illegal("pre_process")),
        }
    }

    /// Advance to the state reached after one more `process` call
    pub fn processed(self) -> Result<Self> {
        match self {
            PluginState::PreProcessed => Ok(PluginState::Processing(1)),
            PluginState::Processing(n) => Ok(PluginState::Processing(n + 1)),
            other => Err(other.illegal("process")),
        }
    }

    /// Advance to the state reached after `post_process`
    pub fn post_processed(self) -> Result<Self> {
        match self {
            PluginState::PreProcessed | PluginState::Processing(_) => Ok(PluginState::PostProcessed),
            other => Err(other.illegal("post_process")),
        }
    }

    /// Number of instances processed so far
    pub fn instances(&self) -> usize {
        match self {
            PluginState::Processing(n) => *n,
            _ => 0,
        }
    }

    fn illegal(self, hook: &str) -> PlumblineError {
        PlumblineError::InvalidState(format!("cannot call {} on a plugin in state {}", hook, self))
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Uninitialized => f.write_str("uninitialized"),
            PluginState::PreProcessed => f.write_str("pre-processed"),
            PluginState::Processing(n) => write!(f, "processing({})", n),
            PluginState::PostProcessed => f.write_str("post-processed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDefinition;
    use crate::validation::result::ValidationResult;
    use serde_json::json;
    use std::sync::Arc;

    struct Counting;

    impl ValidationPlugin for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn process<'a>(
            &'a self,
            instance: &'a Instance,
            _context: &'a ValidationContext,
        ) -> PluginResult<Findings<'a>> {
            Ok(Box::new((0..).map(move |i| {
                Ok(ValidationResult::info(format!("note {}", i)).for_instance(instance))
            })))
        }
    }

    fn context() -> ValidationContext {
        let schema = SchemaDefinition::from_yaml_str("name: s\nclasses:\n  A:\n    tree_root: true\n").unwrap();
        ValidationContext::compile(Arc::new(schema), None).unwrap()
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let mut plugin = Counting;
        let ctx = context();
        assert!(plugin.pre_process(&ctx).is_ok());
        assert!(plugin.post_process(&ctx).unwrap().is_empty());
        assert!(plugin.required_artifacts().is_empty());
    }

    #[test]
    fn test_unbounded_sequence_can_stop_early() {
        let plugin = Counting;
        let ctx = context();
        let instance = Instance::from_value(json!({"id": 1})).unwrap();
        let first: Vec<_> = plugin.process(&instance, &ctx).unwrap().take(2).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].as_ref().unwrap().result.message(), "note 1");
    }

    #[test]
    fn test_boxed_plugin_delegates() {
        let plugin: Box<dyn ValidationPlugin> = Box::new(Counting);
        assert_eq!(plugin.name(), "counting");
    }

    #[test]
    fn test_state_machine_happy_path() {
        let state = PluginState::Uninitialized.pre_processed().unwrap();
        let state = state.processed().unwrap().processed().unwrap();
        assert_eq!(state, PluginState::Processing(2));
        assert_eq!(state.instances(), 2);
        assert_eq!(state.post_processed().unwrap(), PluginState::PostProcessed);
    }

    #[test]
    fn test_state_machine_empty_run() {
        let state = PluginState::Uninitialized.pre_processed().unwrap();
        assert_eq!(state.post_processed().unwrap(), PluginState::PostProcessed);
    }

    #[test]
    fn test_state_machine_rejects_process_before_pre_process() {
        let err = PluginState::Uninitialized.processed().unwrap_err();
        assert!(matches!(err, PlumblineError::InvalidState(_)));
    }

    #[test]
    fn test_state_machine_rejects_process_after_post_process() {
        let err = PluginState::PostProcessed.processed().unwrap_err();
        assert!(err.to_string().contains("post-processed"));
    }

    #[test]
    fn test_state_machine_rejects_double_pre_process() {
        assert!(PluginState::PreProcessed.pre_processed().is_err());
    }
}
