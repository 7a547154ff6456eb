//! Identifier uniqueness and reference integrity across a batch.
//!
//! Every instance's identifier is recorded in scratch space as it is
//! processed, together with each reference it makes. Duplicates are reported
//! immediately; references that no instance of the batch defines can only be
//! known once the batch is complete, so they are reported by `post_process`
//! and attributed to the referencing instance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifacts::INDUCED_SLOTS;
use crate::error::{PluginError, PluginResult};
use crate::instance::{Instance, SourceRef};
use crate::plugins::target_slots;
use crate::schema::RangeKind;
use crate::validation::{
    Findings, FieldPath, Severity, ValidationContext, ValidationPlugin, ValidationResult,
    ValidationResultWithSource,
};

pub const NAME: &str = "references";

const REFERENCES: &str = "references";

fn defined_key(id: &str) -> String {
    format!("defined/{}", id)
}

/// A reference recorded during `process`, resolved in `post_process`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingReference {
    target: String,
    location: FieldPath,
    source: SourceRef,
}

#[derive(Debug, Clone)]
pub struct ReferencesPlugin {
    severity: Severity,
    /// Identifier slot of the target class, if it has one
    identifier: Option<String>,
    /// Slots whose values are identifiers of target-class instances
    reference_slots: Vec<String>,
}

impl ReferencesPlugin {
    pub fn new() -> Self {
        Self {
            severity: Severity::Error,
            identifier: None,
            reference_slots: Vec::new(),
        }
    }

    pub fn with_severity_override(mut self, severity: Option<Severity>) -> Self {
        if let Some(severity) = severity {
            self.severity = severity;
        }
        self
    }

    fn finding(&self, context: &ValidationContext, message: String, path: FieldPath) -> ValidationResult {
        ValidationResult::new(self.severity, message)
            .at(path)
            .with_rule(NAME)
            .instantiates(context.target_class())
    }

    fn references<'a>(&'a self, instance: &'a Instance) -> impl Iterator<Item = (String, FieldPath)> + 'a {
        self.reference_slots.iter().flat_map(move |slot| {
            match instance.get(slot) {
                Some(Value::String(id)) => vec![(id.clone(), FieldPath::field(slot))],
                Some(Value::Array(items)) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        item.as_str()
                            .map(|id| (id.to_string(), FieldPath::field(slot).index(i)))
                    })
                    .collect(),
                _ => Vec::new(),
            }
        })
    }
}

impl Default for ReferencesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPlugin for ReferencesPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn required_artifacts(&self) -> &[&str] {
        &[INDUCED_SLOTS]
    }

    fn pre_process(&mut self, context: &ValidationContext) -> PluginResult<()> {
        let schema = context.schema();
        let slots = target_slots(context)?;
        // Instances in a batch are all of the target class, so only ranges
        // the target class satisfies can be resolved within the batch.
        let resolvable: Vec<String> = schema
            .ancestors(context.target_class())
            .map_err(|e| PluginError::failed(e.to_string()))?
            .iter()
            .map(|class| class.name.clone())
            .collect();

        self.identifier = slots.iter().find(|s| s.identifier).map(|s| s.name.clone());
        self.reference_slots = if self.identifier.is_some() {
            slots
                .iter()
                .filter(|slot| match schema.range_kind(slot) {
                    RangeKind::Class(name) => resolvable.iter().any(|c| c == name),
                    _ => false,
                })
                .map(|slot| slot.name.clone())
                .collect()
        } else {
            Vec::new()
        };

        log::debug!(
            "{}: identifier {:?}, reference slots {:?}",
            NAME,
            self.identifier,
            self.reference_slots
        );
        Ok(())
    }

    fn process<'a>(
        &'a self,
        instance: &'a Instance,
        context: &'a ValidationContext,
    ) -> PluginResult<Findings<'a>> {
        let scratch = context.scratch(NAME);

        let mut duplicate = None;
        if let Some(id) = self
            .identifier
            .as_deref()
            .and_then(|slot| instance.get(slot))
            .and_then(Value::as_str)
        {
            let key = defined_key(id);
            match scratch.get_as::<SourceRef>(&key)? {
                Some(first) => {
                    let slot = self.identifier.as_deref().unwrap_or_default();
                    duplicate = Some(self.finding(
                        context,
                        format!("identifier '{}' was already used by instance {}", id, first),
                        FieldPath::field(slot),
                    ));
                }
                None => scratch.set_as(&key, instance.source())?,
            }
        }

        for (target, location) in self.references(instance) {
            scratch.append_as(
                REFERENCES,
                &PendingReference {
                    target,
                    location,
                    source: instance.source().clone(),
                },
            )?;
        }

        Ok(Box::new(
            duplicate
                .into_iter()
                .map(move |result| Ok(result.for_instance(instance))),
        ))
    }

    fn post_process(&mut self, context: &ValidationContext) -> PluginResult<Vec<ValidationResultWithSource>> {
        let scratch = context.scratch(NAME);
        let pending: Vec<PendingReference> = scratch.get_as(REFERENCES)?.unwrap_or_default();

        let mut findings = Vec::new();
        for reference in pending {
            if scratch.get_as::<SourceRef>(&defined_key(&reference.target))?.is_none() {
                let result = self.finding(
                    context,
                    format!("reference to undefined identifier '{}'", reference.target),
                    reference.location,
                );
                findings.push(ValidationResultWithSource::new(result, reference.source));
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{locations, run};
    use serde_json::json;

    #[test]
    fn test_duplicate_identifier() {
        let report = run(
            ReferencesPlugin::new(),
            vec![json!({"id": "p1"}), json!({"id": "p2"}), json!({"id": "p1"})],
        );
        assert_eq!(report.len(), 1);
        let entry = &report.results()[0];
        assert_eq!(entry.source.index, 2);
        assert_eq!(entry.result.location(), &FieldPath::field("id"));
        assert!(entry.result.message().contains("#0"));
    }

    #[test]
    fn test_forward_references_resolve() {
        let report = run(
            ReferencesPlugin::new(),
            vec![json!({"id": "p1", "friends": ["p2"]}), json!({"id": "p2", "friends": ["p1"]})],
        );
        assert!(report.is_empty());
    }

    #[test]
    fn test_undefined_reference_attributed_to_referrer() {
        let report = run(
            ReferencesPlugin::new(),
            vec![
                json!({"id": "p1", "friends": ["p2", "ghost"]}),
                json!({"id": "p2"}),
            ],
        );
        assert_eq!(locations(&report), vec!["/friends/1"]);
        assert_eq!(report.results()[0].source.index, 0);
        assert!(report.results()[0].result.message().contains("ghost"));
    }

    #[test]
    fn test_other_class_references_not_checked() {
        let report = run(ReferencesPlugin::new(), vec![json!({"id": "p1", "employer": "acme"})]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_inlined_objects_are_not_references() {
        let report = run(ReferencesPlugin::new(), vec![json!({"id": "p1", "friends": [{"id": "p9"}]})]);
        assert!(report.is_empty());
    }
}
