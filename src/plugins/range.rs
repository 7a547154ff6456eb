//! Range, cardinality and numeric bound checks

use std::collections::HashSet;

use serde_json::Value;

use crate::artifacts::{INDUCED_SLOTS, InducedSlots};
use crate::error::PluginResult;
use crate::instance::{Instance, kind_of};
use crate::plugins::target_slots;
use crate::schema::{RangeKind, SlotDefinition};
use crate::validation::{Findings, FieldPath, Severity, ValidationContext, ValidationPlugin, ValidationResult};

pub const NAME: &str = "range";

/// Checks that present values fit their slot's range.
///
/// Enum-ranged values are only checked for being strings here; membership is
/// the `permissible_values` plugin's concern.
#[derive(Debug, Clone)]
pub struct RangePlugin {
    severity: Severity,
    closed: bool,
    /// Classes that declare an identifier slot and can be referenced by id
    referenceable: HashSet<String>,
}

impl RangePlugin {
    pub fn new() -> Self {
        Self {
            severity: Severity::Error,
            closed: false,
            referenceable: HashSet::new(),
        }
    }

    /// Also report fields the target class does not declare
    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn with_severity_override(mut self, severity: Option<Severity>) -> Self {
        if let Some(severity) = severity {
            self.severity = severity;
        }
        self
    }

    fn check_slot(&self, context: &ValidationContext, slot: &SlotDefinition, value: &Value) -> Vec<ValidationResult> {
        let path = FieldPath::field(&slot.name);
        match (slot.multivalued, value) {
            (true, Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| self.check_value(context, slot, item, path.clone().index(i)))
                .collect(),
            (true, other) => vec![self.finding(
                format!("'{}' expects a list, found {}", slot.name, kind_of(other)),
                path,
            )],
            (false, Value::Array(_)) => vec![self.finding(
                format!("'{}' expects a single value, found a list", slot.name),
                path,
            )],
            (false, other) => self.check_value(context, slot, other, path).into_iter().collect(),
        }
    }

    fn check_value(
        &self,
        context: &ValidationContext,
        slot: &SlotDefinition,
        value: &Value,
        path: FieldPath,
    ) -> Option<ValidationResult> {
        let kind = context.schema().range_kind(slot);
        let (fits, expected) = match kind {
            RangeKind::String => (value.is_string(), "string".to_string()),
            RangeKind::Integer => (value.is_i64() || value.is_u64(), "integer".to_string()),
            RangeKind::Float => (value.is_number(), "float".to_string()),
            RangeKind::Boolean => (value.is_boolean(), "boolean".to_string()),
            RangeKind::Enum(name) => (value.is_string(), format!("a {} value", name)),
            RangeKind::Class(name) => {
                let by_reference = value.is_string() && self.referenceable.contains(name);
                (value.is_object() || by_reference, format!("a {} object", name))
            }
            RangeKind::Unknown(_) => (true, String::new()),
        };

        if !fits {
            return Some(self.finding(
                format!("'{}' expects {}, found {}", slot.name, expected, kind_of(value)),
                path,
            ));
        }

        if matches!(kind, RangeKind::Integer | RangeKind::Float) {
            let number = value.as_f64()?;
            if let Some(min) = slot.minimum_value.filter(|min| number < *min) {
                return Some(self.finding(
                    format!("'{}' value {} is below the minimum {}", slot.name, number, min),
                    path,
                ));
            }
            if let Some(max) = slot.maximum_value.filter(|max| number > *max) {
                return Some(self.finding(
                    format!("'{}' value {} is above the maximum {}", slot.name, number, max),
                    path,
                ));
            }
        }
        None
    }

    fn finding(&self, message: String, path: FieldPath) -> ValidationResult {
        ValidationResult::new(self.severity, message)
            .at(path)
            .with_rule(NAME)
    }
}

impl Default for RangePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPlugin for RangePlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn required_artifacts(&self) -> &[&str] {
        &[INDUCED_SLOTS]
    }

    fn pre_process(&mut self, context: &ValidationContext) -> PluginResult<()> {
        let induced = context.require_artifact::<InducedSlots>(INDUCED_SLOTS)?;
        self.referenceable = context
            .schema()
            .classes
            .keys()
            .filter(|class| induced.for_class(class).iter().any(|slot| slot.identifier))
            .cloned()
            .collect();
        Ok(())
    }

    fn process<'a>(
        &'a self,
        instance: &'a Instance,
        context: &'a ValidationContext,
    ) -> PluginResult<Findings<'a>> {
        let slots = target_slots(context)?;

        let range_findings = slots
            .iter()
            .filter_map(move |slot| {
                instance
                    .get(&slot.name)
                    .filter(|value| !value.is_null())
                    .map(|value| (slot, value))
            })
            .flat_map(move |(slot, value)| self.check_slot(context, slot, value));

        let undeclared = instance
            .data()
            .keys()
            .filter(move |field| self.closed && !slots.iter().any(|slot| &slot.name == *field))
            .map(move |field| {
                self.finding(
                    format!("'{}' is not a field of {}", field, context.target_class()),
                    FieldPath::field(field),
                )
            });

        Ok(Box::new(range_findings.chain(undeclared).map(move |result| {
            Ok(result
                .instantiates(context.target_class())
                .for_instance(instance))
        })))
    }
}
