//! Permissible value checks for enum-ranged slots

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::artifacts::INDUCED_SLOTS;
use crate::error::PluginResult;
use crate::instance::Instance;
use crate::plugins::target_slots;
use crate::schema::RangeKind;
use crate::validation::{Findings, FieldPath, Severity, ValidationContext, ValidationPlugin, ValidationResult};

pub const NAME: &str = "permissible_values";

/// Reports enum-ranged string values outside the enum's permissible set
#[derive(Debug, Clone)]
pub struct PermissibleValuesPlugin {
    severity: Severity,
    /// Slot name to (enum name, permissible values) for the target class,
    /// rebuilt by every `pre_process`
    allowed: HashMap<String, (String, HashSet<String>)>,
}

impl PermissibleValuesPlugin {
    pub fn new() -> Self {
        Self {
            severity: Severity::Error,
            allowed: HashMap::new(),
        }
    }

    pub fn with_severity_override(mut self, severity: Option<Severity>) -> Self {
        if let Some(severity) = severity {
            self.severity = severity;
        }
        self
    }
}

impl Default for PermissibleValuesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPlugin for PermissibleValuesPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn required_artifacts(&self) -> &[&str] {
        &[INDUCED_SLOTS]
    }

    fn pre_process(&mut self, context: &ValidationContext) -> PluginResult<()> {
        let schema = context.schema();
        self.allowed = target_slots(context)?
            .iter()
            .filter_map(|slot| match schema.range_kind(slot) {
                RangeKind::Enum(name) => {
                    let values = schema
                        .enum_def(name)?
                        .permissible_values
                        .keys()
                        .cloned()
                        .collect();
                    Some((slot.name.clone(), (name.to_string(), values)))
                }
                _ => None,
            })
            .collect();
        log::debug!("{}: {} enum-ranged slot(s)", NAME, self.allowed.len());
        Ok(())
    }

    fn process<'a>(
        &'a self,
        instance: &'a Instance,
        context: &'a ValidationContext,
    ) -> PluginResult<Findings<'a>> {
        let slots = target_slots(context)?;

        Ok(Box::new(
            slots
                .iter()
                .filter_map(move |slot| {
                    let (enum_name, values) = self.allowed.get(&slot.name)?;
                    let value = instance.get(&slot.name)?;
                    Some((slot, enum_name, values, value))
                })
                .flat_map(|(slot, enum_name, values, value)| {
                    let candidates: Vec<(&str, FieldPath)> = match value {
                        Value::String(s) => vec![(s.as_str(), FieldPath::field(&slot.name))],
                        Value::Array(items) => items
                            .iter()
                            .enumerate()
                            .filter_map(|(i, item)| {
                                item.as_str().map(|s| (s, FieldPath::field(&slot.name).index(i)))
                            })
                            .collect(),
                        _ => Vec::new(),
                    };
                    candidates
                        .into_iter()
                        .filter(move |(s, _)| !values.contains(*s))
                        .map(move |(s, path)| {
                            (format!("'{}' is not a permissible value of {}", s, enum_name), path)
                        })
                })
                .map(move |(message, path)| {
                    let result = ValidationResult::new(self.severity, message)
                        .at(path)
                        .with_rule(NAME)
                        .instantiates(context.target_class());
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
    fn test_unknown_value_reported() {
        let report = run(PermissibleValuesPlugin::new(), vec![json!({"status": "zombie"})]);
        assert_eq!(locations(&report), vec!["/status"]);
        assert!(report.results()[0].result.message().contains("PersonStatus"));
    }

    #[test]
    fn test_permissible_value_accepted() {
        let report = run(
            PermissibleValuesPlugin::new(),
            vec![json!({"status": "alive"}), json!({"status": "dead"})],
        );
        assert!(report.is_empty());
    }

    #[test]
    fn test_non_enum_slots_ignored() {
        let report = run(PermissibleValuesPlugin::new(), vec![json!({"name": "zombie"})]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_pre_process_builds_cache() {
        let schema = crate::plugins::testing::people();
        let ctx = ValidationContext::compile(schema, Some("Person")).unwrap();
        let mut plugin = PermissibleValuesPlugin::new();
        plugin.pre_process(&ctx).unwrap();
        assert_eq!(plugin.allowed.len(), 1);
        assert!(plugin.allowed["status"].1.contains("alive"));
    }
}
