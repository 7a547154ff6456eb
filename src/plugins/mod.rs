//! Builtin validation plugins
//!
//! Each plugin is configured once at construction time. Callers assemble an
//! explicit, ordered list; nothing is discovered implicitly.

pub mod pattern;
pub mod permissible;
pub mod range;
pub mod recommended;
pub mod references;
pub mod required;

pub use pattern::PatternPlugin;
pub use permissible::PermissibleValuesPlugin;
pub use range::RangePlugin;
pub use recommended::RecommendedSlotsPlugin;
pub use references::ReferencesPlugin;
pub use required::RequiredSlotsPlugin;

use serde::{Deserialize, Serialize};

use crate::artifacts::{INDUCED_SLOTS, InducedSlots};
use crate::error::{PluginResult, PlumblineError, Result};
use crate::schema::SlotDefinition;
use crate::validation::{Severity, ValidationContext, ValidationPlugin};

/// Names and one-line descriptions of the builtin plugins, in default order
pub const BUILTIN: &[(&str, &str)] = &[
    (required::NAME, "required slots must be present and non-null"),
    (range::NAME, "values must match their slot's range and cardinality"),
    (pattern::NAME, "string values must match their slot's pattern"),
    (permissible::NAME, "enum values must be permissible"),
    (recommended::NAME, "recommended slots should be present"),
    (references::NAME, "identifiers must be unique and references resolvable"),
];

/// Construction-time settings shared by the builtin plugins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Override the severity of every finding the plugin reports
    pub severity: Option<Severity>,
    /// `range` only: report fields the target class does not declare
    pub closed: bool,
}

/// Build a builtin plugin by name
pub fn builtin(name: &str, settings: &PluginSettings) -> Result<Box<dyn ValidationPlugin>> {
    if settings.closed && name != range::NAME && BUILTIN.iter().any(|(n, _)| *n == name) {
        return Err(PlumblineError::Configuration(format!(
            "plugin '{}' does not accept 'closed' (only '{}' does)",
            name,
            range::NAME
        )));
    }
    let plugin: Box<dyn ValidationPlugin> = match name {
        required::NAME => Box::new(RequiredSlotsPlugin::new().with_severity_override(settings.severity)),
        recommended::NAME => Box::new(RecommendedSlotsPlugin::new().with_severity_override(settings.severity)),
        range::NAME => Box::new(
            RangePlugin::new()
                .closed(settings.closed)
                .with_severity_override(settings.severity),
        ),
        pattern::NAME => Box::new(PatternPlugin::new().with_severity_override(settings.severity)),
        permissible::NAME => Box::new(PermissibleValuesPlugin::new().with_severity_override(settings.severity)),
        references::NAME => Box::new(ReferencesPlugin::new().with_severity_override(settings.severity)),
        other => {
            let known: Vec<&str> = BUILTIN.iter().map(|(n, _)| *n).collect();
            return Err(PlumblineError::Configuration(format!(
                "unknown plugin '{}' (known: {})",
                other,
                known.join(", ")
            )));
        }
    };
    Ok(plugin)
}

/// Every builtin plugin with default settings, in default order
pub fn default_set() -> Vec<Box<dyn ValidationPlugin>> {
    BUILTIN
        .iter()
        .filter_map(|(name, _)| builtin(name, &PluginSettings::default()).ok())
        .collect()
}

/// Induced slots of the run's target class
pub(crate) fn target_slots(context: &ValidationContext) -> PluginResult<&[SlotDefinition]> {
    let induced = context.require_artifact::<InducedSlots>(INDUCED_SLOTS)?;
    Ok(induced.for_class(context.target_class()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::instance::Instance;
    use crate::schema::SchemaDefinition;
    use crate::validation::{Runner, ValidationPlugin, ValidationReport};

    pub const PEOPLE: &str = r#"
name: people
classes:
  Person:
    tree_root: true
    attributes:
      id:
        identifier: true
        required: true
      name:
        required: true
      email:
        recommended: true
        pattern: '[^@\s]+@[^@\s]+'
      age:
        range: integer
        minimum_value: 0
        maximum_value: 200
      height:
        range: float
      alive:
        range: boolean
      status:
        range: PersonStatus
      aliases:
        multivalued: true
        pattern: '[A-Za-z ]+'
      friends:
        range: Person
        multivalued: true
      employer:
        range: Organization
  Organization:
    attributes:
      id:
        identifier: true
enums:
  PersonStatus:
    permissible_values:
      alive:
      dead:
"#;

    pub fn people() -> Arc<SchemaDefinition> {
        Arc::new(SchemaDefinition::from_yaml_str(PEOPLE).unwrap())
    }

    pub fn instances(values: Vec<Value>) -> Vec<Instance> {
        values
            .into_iter()
            .map(|v| Instance::from_value(v).unwrap())
            .collect()
    }

    pub fn run(plugin: impl ValidationPlugin + 'static, values: Vec<Value>) -> ValidationReport {
        Runner::new()
            .with_plugin(plugin)
            .run(people(), Some("Person"), instances(values))
            .unwrap()
    }

    pub fn locations(report: &ValidationReport) -> Vec<String> {
        report
            .results()
            .iter()
            .map(|r| r.result.location().to_string())
            .collect()
    }
}
