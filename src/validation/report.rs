//! Validation reports
//!
//! The builder collects sourced results in the order the runner hands them
//! over and is consumed to produce the final, immutable report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instance::SourceRef;
use crate::validation::result::{ResultKind, Severity, ValidationResultWithSource};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every instance and every `post_process` hook ran
    Completed,
    /// The caller stopped early; no `post_process` hook ran
    Cancelled,
}

/// Accumulates results during a run
#[derive(Debug)]
pub struct ReportBuilder {
    target_class: String,
    started_at: DateTime<Utc>,
    instances: usize,
    results: Vec<ValidationResultWithSource>,
}

impl ReportBuilder {
    pub fn new(target_class: impl Into<String>) -> Self {
        Self {
            target_class: target_class.into(),
            started_at: Utc::now(),
            instances: 0,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: ValidationResultWithSource) {
        self.results.push(result);
    }

    /// Count one more processed instance
    pub fn instance_processed(&mut self) {
        self.instances += 1;
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results pushed from position `start` onwards
    pub fn since(&self, start: usize) -> &[ValidationResultWithSource] {
        &self.results[start.min(self.results.len())..]
    }

    /// Seal the report
    pub fn finish(self, status: RunStatus) -> ValidationReport {
        ValidationReport {
            target_class: self.target_class,
            status,
            instances: self.instances,
            started_at: self.started_at,
            finished_at: Utc::now(),
            results: self.results,
        }
    }
}

/// Final outcome of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    target_class: String,
    status: RunStatus,
    instances: usize,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    results: Vec<ValidationResultWithSource>,
}

impl ValidationReport {
    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Number of instances the run processed
    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// All results in the order they were produced
    pub fn results(&self) -> &[ValidationResultWithSource] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|r| r.result.severity() == severity)
            .count()
    }

    /// Result counts for every severity, including zero counts
    pub fn counts_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts: BTreeMap<Severity, usize> = [Severity::Info, Severity::Warning, Severity::Error]
            .into_iter()
            .map(|s| (s, 0))
            .collect();
        for entry in &self.results {
            *counts.entry(entry.result.severity()).or_default() += 1;
        }
        counts
    }

    /// Results produced for one instance
    pub fn results_for<'a>(
        &'a self,
        source: &'a SourceRef,
    ) -> impl Iterator<Item = &'a ValidationResultWithSource> + 'a {
        self.results.iter().filter(move |r| &r.source == source)
    }

    /// Synthetic results recorded for plugin faults
    pub fn internal_errors(&self) -> impl Iterator<Item = &ValidationResultWithSource> {
        self.results
            .iter()
            .filter(|r| r.result.kind() == ResultKind::InternalError)
    }

    /// True when any result is at or above error severity
    pub fn has_errors(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.result.severity() >= Severity::Error)
    }

    /// A completed run without errors
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Completed && !self.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use crate::validation::result::ValidationResult;
    use serde_json::json;

    fn instance(id: &str, index: usize) -> Instance {
        let mut inst = Instance::from_value(json!({ "id": id })).unwrap();
        inst.set_index(index);
        inst
    }

    #[test]
    fn test_empty_report_passes() {
        let report = ReportBuilder::new("Person").finish(RunStatus::Completed);
        assert!(report.is_empty());
        assert!(!report.has_errors());
        assert!(report.passed());
        assert_eq!(report.target_class(), "Person");
        assert!(report.finished_at() >= report.started_at());
    }

    #[test]
    fn test_counts_and_order() {
        let a = instance("a", 0);
        let mut builder = ReportBuilder::new("Person");
        builder.push(ValidationResult::warning("w").for_instance(&a));
        builder.push(ValidationResult::error("e").for_instance(&a));
        builder.push(ValidationResult::warning("w2").for_instance(&a));
        builder.instance_processed();
        let report = builder.finish(RunStatus::Completed);

        assert_eq!(report.len(), 3);
        assert_eq!(report.instances(), 1);
        assert_eq!(report.count(Severity::Warning), 2);
        let counts = report.counts_by_severity();
        assert_eq!(counts[&Severity::Error], 1);
        assert_eq!(counts[&Severity::Info], 0);
        let messages: Vec<&str> = report.results().iter().map(|r| r.result.message()).collect();
        assert_eq!(messages, vec!["w", "e", "w2"]);
        assert!(report.has_errors());
        assert!(!report.passed());
    }

    #[test]
    fn test_warnings_only_still_pass() {
        let a = instance("a", 0);
        let mut builder = ReportBuilder::new("Person");
        builder.push(ValidationResult::warning("w").for_instance(&a));
        assert!(builder.finish(RunStatus::Completed).passed());
    }

    #[test]
    fn test_results_for_source() {
        let a = instance("a", 0);
        let b = instance("b", 1);
        let mut builder = ReportBuilder::new("Person");
        builder.push(ValidationResult::error("a1").for_instance(&a));
        builder.push(ValidationResult::error("b1").for_instance(&b));
        builder.push(ValidationResult::error("a2").for_instance(&a));
        let report = builder.finish(RunStatus::Completed);

        let for_a: Vec<&str> = report.results_for(a.source()).map(|r| r.result.message()).collect();
        assert_eq!(for_a, vec!["a1", "a2"]);
        assert_eq!(report.results_for(b.source()).count(), 1);
    }

    #[test]
    fn test_cancelled_run_never_passes() {
        let report = ReportBuilder::new("Person").finish(RunStatus::Cancelled);
        assert_eq!(report.status(), RunStatus::Cancelled);
        assert!(!report.passed());
    }

    #[test]
    fn test_since() {
        let a = instance("a", 0);
        let mut builder = ReportBuilder::new("Person");
        builder.push(ValidationResult::info("1").for_instance(&a));
        let mark = builder.len();
        builder.push(ValidationResult::info("2").for_instance(&a));
        assert_eq!(builder.since(mark).len(), 1);
        assert!(builder.since(10).is_empty());
    }

    #[test]
    fn test_internal_errors_filter() {
        let a = instance("a", 0);
        let mut builder = ReportBuilder::new("Person");
        builder.push(ValidationResult::error("e").for_instance(&a));
        builder.push(ValidationResult::internal_error("p", "boom").for_instance(&a));
        let report = builder.finish(RunStatus::Completed);
        assert_eq!(report.internal_errors().count(), 1);
    }
}
