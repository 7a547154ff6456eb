//! Report rendering for the terminal

use colored::*;
use eyre::{Context, Result};
use plumbline::validation::{ResultKind, RunStatus};
use plumbline::{Severity, ValidationReport};

use crate::config::OutputFormat;

pub fn render(report: &ValidationReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => serde_json::to_string_pretty(report).context("Failed to serialize report as JSON"),
        OutputFormat::Yaml => serde_yaml::to_string(report).context("Failed to serialize report as YAML"),
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".cyan(),
    }
}

/// One line per result grouped under its instance, followed by a summary
pub fn render_text(report: &ValidationReport) -> String {
    let mut lines = Vec::new();
    let mut current = None;

    for entry in report.results() {
        if current != Some(&entry.source) {
            lines.push(format!("{}", entry.source.to_string().bold()));
            current = Some(&entry.source);
        }

        let result = &entry.result;
        let mut line = format!(
            "  {} {}: {}",
            severity_label(result.severity()),
            result.location(),
            result.message()
        );
        if let Some(rule) = result.rule() {
            line.push_str(&format!(" {}", format!("[{}]", rule).dimmed()));
        }
        if result.kind() == ResultKind::InternalError {
            line.push_str(&format!(" {}", "(plugin fault)".magenta()));
        }
        lines.push(line);
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }

    let counts = report.counts_by_severity();
    let summary = format!(
        "{} instance(s) validated as {}: {} error(s), {} warning(s), {} info",
        report.instances(),
        report.target_class(),
        counts.get(&Severity::Error).copied().unwrap_or_default(),
        counts.get(&Severity::Warning).copied().unwrap_or_default(),
        counts.get(&Severity::Info).copied().unwrap_or_default(),
    );
    lines.push(summary);

    let verdict = match (report.status(), report.passed()) {
        (RunStatus::Cancelled, _) => "STOPPED EARLY".yellow().bold(),
        (RunStatus::Completed, true) => "PASSED".green().bold(),
        (RunStatus::Completed, false) => "FAILED".red().bold(),
    };
    lines.push(verdict.to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plumbline::validation::{FieldPath, ReportBuilder, ValidationResult, ValidationResultWithSource};
    use plumbline::SourceRef;

    fn plain() {
        colored::control::set_override(false);
    }

    fn source(index: usize) -> SourceRef {
        SourceRef {
            index,
            origin: Some(format!("people.yml#{}", index)),
            fingerprint: String::new(),
        }
    }

    fn report() -> ValidationReport {
        let mut builder = ReportBuilder::new("Person");
        builder.instance_processed();
        builder.instance_processed();
        builder.push(ValidationResultWithSource::new(
            ValidationResult::error("'id' is a required field")
                .at(FieldPath::field("id"))
                .with_rule("required"),
            source(0),
        ));
        builder.push(ValidationResultWithSource::new(
            ValidationResult::warning("'email' is recommended but missing").with_rule("recommended"),
            source(0),
        ));
        builder.push(ValidationResultWithSource::new(
            ValidationResult::internal_error("range", "boom"),
            source(1),
        ));
        builder.finish(RunStatus::Completed)
    }

    #[test]
    fn test_text_groups_by_instance() {
        plain();
        let text = render_text(&report());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#0 (people.yml#0)");
        assert_eq!(lines[1], "  error /id: 'id' is a required field [required]");
        assert!(lines[2].starts_with("  warning /:"));
        assert_eq!(lines[3], "#1 (people.yml#1)");
        assert!(lines[4].ends_with("(plugin fault)"));
        assert!(text.contains("2 instance(s) validated as Person: 2 error(s), 1 warning(s), 0 info"));
        assert!(text.ends_with("FAILED"));
    }

    #[test]
    fn test_text_empty_report_passes() {
        plain();
        let report = ReportBuilder::new("Person").finish(RunStatus::Completed);
        let text = render_text(&report);
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("PASSED"));
    }

    #[test]
    fn test_cancelled_report() {
        plain();
        let report = ReportBuilder::new("Person").finish(RunStatus::Cancelled);
        assert!(render_text(&report).ends_with("STOPPED EARLY"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = render(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target_class"], "Person");
        assert_eq!(value["results"][0]["result"]["location"], "/id");
        assert_eq!(value["results"][2]["result"]["kind"], "internal_error");
    }

    #[test]
    fn test_yaml_output() {
        let yaml = render(&report(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("target_class: Person"));
        assert!(yaml.contains("status: completed"));
    }
}
