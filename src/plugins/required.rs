//! Required slot checks

use crate::error::PluginResult;
use crate::instance::Instance;
use crate::plugins::target_slots;
use crate::validation::{Findings, FieldPath, Severity, ValidationContext, ValidationPlugin, ValidationResult};

pub const NAME: &str = "required";

/// Reports required slots that are absent or null
#[derive(Debug, Clone)]
pub struct RequiredSlotsPlugin {
    severity: Severity,
}

impl RequiredSlotsPlugin {
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

impl Default for RequiredSlotsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPlugin for RequiredSlotsPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn required_artifacts(&self) -> &[&str] {
        &[crate::artifacts::INDUCED_SLOTS]
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
                .filter(move |slot| slot.required && !instance.has(&slot.name))
                .map(move |slot| {
                    let result = ValidationResult::new(
                        self.severity,
                        format!("'{}' is a required field", slot.name),
                    )
                    .at(FieldPath::field(&slot.name))
                    .with_rule(NAME)
                    .instantiates(context.target_class());
                    Ok(result.for_instance(instance))
                }),
        ))
    }
}
