//! Regular-expression checks on string values

use serde_json::Value;

use crate::artifacts::{COMPILED_PATTERNS, CompiledPatterns, INDUCED_SLOTS};
use crate::error::PluginResult;
use crate::instance::Instance;
use crate::plugins::target_slots;
use crate::validation::{Findings, FieldPath, Severity, ValidationContext, ValidationPlugin, ValidationResult};

pub const NAME: &str = "pattern";

/// Reports string values that do not match their slot's pattern.
///
/// Non-string values are skipped; `range` reports those.
#[derive(Debug, Clone)]
pub struct PatternPlugin {
    severity: Severity,
}

impl PatternPlugin {
    pub fn new() -> Self {
        Self {
            severity: Severity::Error,
        }
    }

    pub fn with_severity_override(mut self, severity: Option<Severity>) -> Self {
        if let Some(severity) = severity {
            self.severity = severity;
        }
        self
    }
}

impl Default for PatternPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// String values of a field together with their locations
fn strings<'a>(name: &'a str, value: &'a Value) -> Vec<(&'a str, FieldPath)> {
    match value {
        Value::String(s) => vec![(s.as_str(), FieldPath::field(name))],
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_str().map(|s| (s, FieldPath::field(name).index(i))))
            .collect(),
        _ => Vec::new(),
    }
}

impl ValidationPlugin for PatternPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn required_artifacts(&self) -> &[&str] {
        &[INDUCED_SLOTS, COMPILED_PATTERNS]
    }

    fn process<'a>(
        &'a self,
        instance: &'a Instance,
        context: &'a ValidationContext,
    ) -> PluginResult<Findings<'a>> {
        let slots = target_slots(context)?;
        let patterns = context.require_artifact::<CompiledPatterns>(COMPILED_PATTERNS)?;
        let class_name = context.target_class();

        Ok(Box::new(
            slots
                .iter()
                .filter_map(move |slot| {
                    let regex = patterns.get(class_name, &slot.name)?;
                    let value = instance.get(&slot.name)?;
                    Some((slot, regex, value))
                })
                .flat_map(|(slot, regex, value)| {
                    strings(&slot.name, value)
                        .into_iter()
                        .filter(move |(s, _)| !regex.is_match(s))
                        .map(move |(s, path)| {
                            let pattern = slot.pattern.as_deref().unwrap_or_default();
                            (format!("'{}' does not match pattern '{}'", s, pattern), path)
                        })
                })
                .map(move |(message, path)| {
                    let result = ValidationResult::new(self.severity, message)
                        .at(path)
                        .with_rule(NAME)
                        .instantiates(class_name);
                    Ok(result.for_instance(instance))
                }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{locations, run};
    use serde_json::json;

    #[test]
    fn test_mismatch_reported() {
        let report = run(PatternPlugin::new(), vec![json!({"email": "not-an-email"})]);
        assert_eq!(locations(&report), vec!["/email"]);
        assert!(report.results()[0].result.message().contains("not-an-email"));
    }

    #[test]
    fn test_match_is_quiet() {
        let report = run(PatternPlugin::new(), vec![json!({"email": "ada@example.org"})]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let report = run(PatternPlugin::new(), vec![json!({"aliases": ["Ada", "Ada 2"]})]);
        assert_eq!(locations(&report), vec!["/aliases/1"]);
    }

    #[test]
    fn test_non_strings_skipped() {
        let report = run(PatternPlugin::new(), vec![json!({"email": 5, "aliases": [1, 2]})]);
        assert!(report.is_empty());
    }
}
