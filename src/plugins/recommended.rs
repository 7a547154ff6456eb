//! Recommended slot checks

use crate::error::PluginResult;
use crate::instance::Instance;
use crate::plugins::target_slots;
use crate::validation::{Findings, FieldPath, Severity, ValidationContext, ValidationPlugin, ValidationResult};

pub const NAME: &str = "recommended";

/// Warns about recommended slots that are absent
#[derive(Debug, Clone)]
pub struct RecommendedSlotsPlugin {
    severity: Severity,
}

impl RecommendedSlotsPlugin {
    pub fn new() -> Self {
        Self {
            severity: Severity::Warning,
        }
    }

    pub fn with_severity_override(mut self, severity: Option<Severity>) -> Self {
        if let Some(severity) = severity {
            self.severity = severity;
        }
        self
    }
}

impl Default for RecommendedSlotsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPlugin for RecommendedSlotsPlugin {
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
                .filter(move |slot| slot.recommended && !instance.has(&slot.name))
                .map(move |slot| {
                    let result = ValidationResult::new(
                        self.severity,
                        format!("'{}' is recommended but missing", slot.name),
                    )
                    .at(FieldPath::field(&slot.name))
                    .with_rule(NAME)
                    .instantiates(context.target_class());
                    Ok(result.for_instance(instance))
                }),
        ))
    }
}
