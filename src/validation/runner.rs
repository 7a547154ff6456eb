//! Plugin pipeline runner
//!
//! Drives an ordered set of plugins through one run: `pre_process` on every
//! plugin, then for each instance `process` on every plugin (each sequence is
//! drained completely before the next plugin starts), then `post_process` on
//! every plugin.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::artifacts::{self, Artifacts};
use crate::error::{Hook, PluginError, PlumblineError, Result};
use crate::instance::{Instance, SourceRef};
use crate::schema::SchemaDefinition;
use crate::validation::context::ValidationContext;
use crate::validation::plugin::{PluginState, ValidationPlugin};
use crate::validation::report::{ReportBuilder, RunStatus, ValidationReport};
use crate::validation::result::{ValidationResult, ValidationResultWithSource};

/// What to do when `process` fails for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Record an internal-error result for the plugin and instance, then
    /// carry on with the next plugin
    #[default]
    Continue,
    /// Abort the whole run
    Abort,
}

impl fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultPolicy::Continue => f.write_str("continue"),
            FaultPolicy::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for FaultPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(FaultPolicy::Continue),
            "abort" => Ok(FaultPolicy::Abort),
            other => Err(format!("unknown fault policy '{}' (expected continue or abort)", other)),
        }
    }
}

/// An ordered plugin pipeline
#[derive(Default)]
pub struct Runner {
    plugins: Vec<Box<dyn ValidationPlugin>>,
    policy: FaultPolicy,
    artifacts: Artifacts,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin (builder pattern); plugins run in insertion order
    pub fn with_plugin(mut self, plugin: impl ValidationPlugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Append a boxed plugin
    pub fn add_boxed(mut self, plugin: Box<dyn ValidationPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_policy(mut self, policy: FaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Extra artifacts made available next to the builtin ones
    pub fn with_artifacts(mut self, artifacts: Artifacts) -> Self {
        self.artifacts.extend(artifacts);
        self
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Begin a run.
    ///
    /// Builds the run's context, checks every plugin's required artifacts and
    /// calls `pre_process` on each plugin in order. Nothing is called on any
    /// plugin when the configuration is invalid.
    pub fn start(
        &mut self,
        schema: Arc<SchemaDefinition>,
        target_class: Option<&str>,
    ) -> Result<ValidationSession<'_>> {
        let mut artifacts = artifacts::compile(&schema)?;
        artifacts.extend(self.artifacts.clone());
        let context = ValidationContext::new(schema, target_class, artifacts)?;

        for plugin in &self.plugins {
            if let Some(missing) = plugin
                .required_artifacts()
                .iter()
                .find(|key| !context.artifacts().contains(key))
            {
                return Err(PlumblineError::Configuration(format!(
                    "plugin '{}' requires missing artifact '{}'",
                    plugin.name(),
                    missing
                )));
            }
        }

        info!(
            "Starting run: target class '{}', plugins [{}], policy {}",
            context.target_class(),
            self.plugin_names().join(", "),
            self.policy
        );

        context.open_scratch();
        let mut states = vec![PluginState::Uninitialized; self.plugins.len()];
        for (plugin, state) in self.plugins.iter_mut().zip(states.iter_mut()) {
            *state = state.pre_processed()?;
            plugin
                .pre_process(&context)
                .map_err(|source| PlumblineError::Lifecycle {
                    plugin: plugin.name().to_string(),
                    hook: Hook::PreProcess,
                    source,
                })?;
        }

        let report = ReportBuilder::new(context.target_class());
        Ok(ValidationSession {
            plugins: &mut self.plugins,
            states,
            policy: self.policy,
            context,
            report: Some(report),
            next_index: 0,
            processed: HashSet::new(),
            aborted: false,
        })
    }

    /// Validate every instance of `instances` and return the finished report
    pub fn run<I>(
        &mut self,
        schema: Arc<SchemaDefinition>,
        target_class: Option<&str>,
        instances: I,
    ) -> Result<ValidationReport>
    where
        I: IntoIterator<Item = Instance>,
    {
        let mut session = self.start(schema, target_class)?;
        for instance in instances {
            session.process(instance)?;
        }
        session.finish()
    }
}

/// One run in progress.
///
/// Dropping a session without calling [`finish`](Self::finish) cancels the
/// run: no `post_process` hook is called. Once `process` has returned an
/// error the run is aborted: `process` and `finish` are refused and only
/// [`cancel`](Self::cancel) is left.
pub struct ValidationSession<'r> {
    plugins: &'r mut [Box<dyn ValidationPlugin>],
    states: Vec<PluginState>,
    policy: FaultPolicy,
    context: ValidationContext,
    report: Option<ReportBuilder>,
    next_index: usize,
    processed: HashSet<SourceRef>,
    aborted: bool,
}

impl ValidationSession<'_> {
    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// Lifecycle state of every plugin, in configured order
    pub fn states(&self) -> &[PluginState] {
        &self.states
    }

    pub fn instances_processed(&self) -> usize {
        self.next_index
    }

    /// Whether an escalated fault has ended the run
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Run every plugin over one instance and return the findings it produced.
    ///
    /// An error aborts the run. Plugins after the failing one never see the
    /// instance.
    pub fn process(&mut self, mut instance: Instance) -> Result<&[ValidationResultWithSource]> {
        if self.aborted {
            return Err(aborted_error());
        }
        let report = self
            .report
            .as_mut()
            .ok_or_else(|| PlumblineError::InvalidState("session already closed".to_string()))?;

        instance.set_index(self.next_index);
        self.next_index += 1;
        self.processed.insert(instance.source().clone());
        let mark = report.len();

        debug!("Processing instance {}", instance.source());
        for (plugin, state) in self.plugins.iter().zip(self.states.iter_mut()) {
            let outcome = state.processed().and_then(|next| {
                *state = next;
                drain(plugin.as_ref(), &instance, &self.context, report, self.policy)
            });
            if let Err(err) = outcome {
                self.aborted = true;
                warn!("Run aborted on instance {}: {}", instance.source(), err);
                return Err(err);
            }
        }
        report.instance_processed();

        Ok(report.since(mark))
    }

    /// Call `post_process` on every plugin and seal the report.
    ///
    /// Cross-instance findings must be attributed to an instance processed in
    /// this run.
    pub fn finish(mut self) -> Result<ValidationReport> {
        if self.aborted {
            return Err(aborted_error());
        }
        let mut report = self
            .report
            .take()
            .ok_or_else(|| PlumblineError::InvalidState("session already closed".to_string()))?;

        for (plugin, state) in self.plugins.iter_mut().zip(self.states.iter_mut()) {
            *state = state.post_processed()?;
            let findings = plugin
                .post_process(&self.context)
                .map_err(|source| PlumblineError::Lifecycle {
                    plugin: plugin.name().to_string(),
                    hook: Hook::PostProcess,
                    source,
                })?;
            if !findings.is_empty() {
                debug!("Plugin '{}' reported {} cross-instance finding(s)", plugin.name(), findings.len());
            }
            for finding in findings {
                if !self.processed.contains(&finding.source) {
                    return Err(PlumblineError::Lifecycle {
                        plugin: plugin.name().to_string(),
                        hook: Hook::PostProcess,
                        source: PluginError::UnknownSource(finding.source),
                    });
                }
                report.push(finding);
            }
        }

        let report = report.finish(RunStatus::Completed);
        info!(
            "Run completed: {} instance(s), {} result(s), errors: {}",
            report.instances(),
            report.len(),
            report.has_errors()
        );
        Ok(report)
    }

    /// Stop the run without calling any `post_process` hook.
    ///
    /// Also the way to collect the partial report of an aborted run.
    pub fn cancel(mut self) -> ValidationReport {
        let report = self
            .report
            .take()
            .unwrap_or_else(|| ReportBuilder::new(self.context.target_class()));
        info!("Run cancelled after {} instance(s)", self.next_index);
        report.finish(RunStatus::Cancelled)
    }
}

fn aborted_error() -> PlumblineError {
    PlumblineError::InvalidState("run aborted after a plugin fault".to_string())
}

impl Drop for ValidationSession<'_> {
    fn drop(&mut self) {
        if self.report.is_some() && !self.aborted {
            warn!(
                "Validation session dropped after {} instance(s) without finishing; post_process skipped",
                self.next_index
            );
        }
    }
}

/// Drain one plugin's findings for one instance into the report
fn drain(
    plugin: &dyn ValidationPlugin,
    instance: &Instance,
    context: &ValidationContext,
    report: &mut ReportBuilder,
    policy: FaultPolicy,
) -> Result<()> {
    let outcome = plugin.process(instance, context).and_then(|findings| {
        for item in findings {
            let sourced = item?;
            if &sourced.source != instance.source() {
                return Err(PluginError::SourceMismatch {
                    expected: instance.source().clone(),
                    found: sourced.source,
                });
            }
            report.push(sourced);
        }
        Ok(())
    });

    let Err(err) = outcome else {
        return Ok(());
    };

    match policy {
        FaultPolicy::Continue => {
            warn!(
                "Plugin '{}' failed on instance {}: {}",
                plugin.name(),
                instance.source(),
                err
            );
            let result = ValidationResult::internal_error(plugin.name(), err.to_string())
                .instantiates(context.target_class());
            report.push(result.for_instance(instance));
            Ok(())
        }
        FaultPolicy::Abort => Err(PlumblineError::InstanceFault {
            plugin: plugin.name().to_string(),
            hook: Hook::Process,
            instance: instance.source().clone(),
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginResult;
    use crate::validation::plugin::{Findings, no_findings};
    use crate::validation::result::{ResultKind, Severity};
    use serde_json::json;

    fn schema() -> Arc<SchemaDefinition> {
        Arc::new(SchemaDefinition::from_yaml_str("name: s\nclasses:\n  Thing:\n    tree_root: true\n").unwrap())
    }

    fn instance(id: u32) -> Instance {
        Instance::from_value(json!({ "id": id })).unwrap()
    }

    /// Yields one warning per instance
    struct Noting;

    impl ValidationPlugin for Noting {
        fn name(&self) -> &str {
            "noting"
        }

        fn process<'a>(
            &'a self,
            instance: &'a Instance,
            _context: &'a ValidationContext,
        ) -> PluginResult<Findings<'a>> {
            Ok(Box::new(std::iter::once_with(move || {
                Ok(ValidationResult::warning("noted").for_instance(instance))
            })))
        }
    }

    /// Claims results belong to a different instance
    struct Mislabeling;

    impl ValidationPlugin for Mislabeling {
        fn name(&self) -> &str {
            "mislabeling"
        }

        fn process<'a>(
            &'a self,
            _instance: &'a Instance,
            _context: &'a ValidationContext,
        ) -> PluginResult<Findings<'a>> {
            let other = Instance::from_value(json!({"other": true})).unwrap();
            Ok(Box::new(std::iter::once(Ok(ValidationResult::error("x").for_instance(&other)))))
        }
    }

    struct NeedsArtifact;

    impl ValidationPlugin for NeedsArtifact {
        fn name(&self) -> &str {
            "needs_artifact"
        }

        fn required_artifacts(&self) -> &[&str] {
            &["lookup_table"]
        }

        fn process<'a>(
            &'a self,
            _instance: &'a Instance,
            _context: &'a ValidationContext,
        ) -> PluginResult<Findings<'a>> {
            Ok(no_findings())
        }
    }

    #[test]
    fn test_fault_policy_parse() {
        assert_eq!("abort".parse::<FaultPolicy>().unwrap(), FaultPolicy::Abort);
        assert_eq!("Continue".parse::<FaultPolicy>().unwrap(), FaultPolicy::Continue);
        assert!("retry".parse::<FaultPolicy>().is_err());
        assert_eq!(FaultPolicy::default(), FaultPolicy::Continue);
    }

    #[test]
    fn test_runner_builder() {
        let runner = Runner::new()
            .with_plugin(Noting)
            .add_boxed(Box::new(NeedsArtifact))
            .with_policy(FaultPolicy::Abort);
        assert_eq!(runner.len(), 2);
        assert_eq!(runner.plugin_names(), vec!["noting", "needs_artifact"]);
        assert_eq!(runner.policy(), FaultPolicy::Abort);
    }

    #[test]
    fn test_session_returns_findings_per_instance() {
        let mut runner = Runner::new().with_plugin(Noting);
        let mut session = runner.start(schema(), None).unwrap();
        let findings = session.process(instance(1)).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].source.index, 0);

        let findings = session.process(instance(2)).unwrap().to_vec();
        assert_eq!(findings[0].source.index, 1);
        assert_eq!(session.states(), &[PluginState::Processing(2)]);

        let report = session.finish().unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.instances(), 2);
    }

    #[test]
    fn test_missing_artifact_is_configuration_error() {
        let mut runner = Runner::new().with_plugin(NeedsArtifact);
        let err = runner.run(schema(), None, vec![instance(1)]).unwrap_err();
        assert!(matches!(err, PlumblineError::Configuration(_)));
        assert!(err.to_string().contains("lookup_table"));
    }

    #[test]
    fn test_extra_artifacts_satisfy_requirements() {
        let mut runner = Runner::new()
            .with_plugin(NeedsArtifact)
            .with_artifacts(Artifacts::new().with("lookup_table", vec!["a"]));
        let report = runner.run(schema(), None, vec![instance(1)]).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_mislabeled_result_is_plugin_fault() {
        let mut runner = Runner::new().with_plugin(Mislabeling);
        let report = runner.run(schema(), None, vec![instance(1)]).unwrap();
        assert_eq!(report.len(), 1);
        let entry = &report.results()[0];
        assert_eq!(entry.result.kind(), ResultKind::InternalError);
        assert_eq!(entry.result.rule(), Some("mislabeling"));
        assert_eq!(entry.source.index, 0);
    }

    #[test]
    fn test_mislabeled_result_aborts_under_abort_policy() {
        let mut runner = Runner::new()
            .with_plugin(Mislabeling)
            .with_policy(FaultPolicy::Abort);
        let err = runner.run(schema(), None, vec![instance(1)]).unwrap_err();
        assert!(matches!(
            err,
            PlumblineError::InstanceFault { source: PluginError::SourceMismatch { .. }, .. }
        ));
    }

    #[test]
    fn test_cancel_reports_partial_results() {
        let mut runner = Runner::new().with_plugin(Noting);
        let mut session = runner.start(schema(), None).unwrap();
        session.process(instance(1)).unwrap();
        let report = session.cancel();
        assert_eq!(report.status(), RunStatus::Cancelled);
        assert_eq!(report.len(), 1);
        assert_eq!(report.results()[0].result.severity(), Severity::Warning);
    }
}
