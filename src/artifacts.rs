//! Precomputed schema artifacts shared by plugins during a run.
//!
//! Artifacts are derived once from a resolved schema and looked up by key.
//! The map is type-erased so plugins can ship their own artifact types
//! alongside the builtin ones.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{PlumblineError, Result};
use crate::schema::{SchemaDefinition, SlotDefinition};

/// Key of the [`InducedSlots`] artifact
pub const INDUCED_SLOTS: &str = "induced_slots";

/// Key of the [`CompiledPatterns`] artifact
pub const COMPILED_PATTERNS: &str = "compiled_patterns";

/// Keyed, read-only collection of derived structures
#[derive(Clone, Default)]
pub struct Artifacts {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact (builder pattern)
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Arc::new(value));
    }

    /// Typed lookup; `None` when absent or stored under a different type
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| (**v).downcast_ref::<T>())
    }

    /// Merge another collection in; entries from `other` win on key clashes
    pub fn extend(&mut self, other: Artifacts) {
        self.entries.extend(other.entries);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Artifacts").field("keys", &keys).finish()
    }
}

/// Induced slots (own plus inherited) per concrete class
#[derive(Debug, Clone, Default)]
pub struct InducedSlots {
    by_class: HashMap<String, Vec<SlotDefinition>>,
}

impl InducedSlots {
    pub fn for_class(&self, class_name: &str) -> &[SlotDefinition] {
        self.by_class.get(class_name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Compiled regexes for every slot that declares a pattern, by (class, slot)
#[derive(Debug, Clone, Default)]
pub struct CompiledPatterns {
    by_slot: HashMap<(String, String), Regex>,
}

impl CompiledPatterns {
    pub fn get(&self, class_name: &str, slot_name: &str) -> Option<&Regex> {
        self.by_slot
            .get(&(class_name.to_string(), slot_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

/// Build the builtin artifacts for a schema.
///
/// Patterns are anchored at both ends, so `pattern: "[a-z]+"` must match the
/// whole value. An invalid pattern is a configuration error.
pub fn compile(schema: &SchemaDefinition) -> Result<Artifacts> {
    let mut induced = InducedSlots::default();
    let mut patterns = CompiledPatterns::default();

    for class_name in schema.classes.keys() {
        let slots = schema.induced_slots(class_name)?;
        for slot in &slots {
            if let Some(pattern) = &slot.pattern {
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    PlumblineError::Configuration(format!(
                        "invalid pattern on {}.{}: {}",
                        class_name, slot.name, e
                    ))
                })?;
                patterns
                    .by_slot
                    .insert((class_name.clone(), slot.name.clone()), regex);
            }
        }
        induced.by_class.insert(class_name.clone(), slots);
    }

    log::debug!(
        "Compiled artifacts for schema '{}': {} classes, {} patterns",
        schema.name,
        induced.by_class.len(),
        patterns.len()
    );

    Ok(Artifacts::new()
        .with(INDUCED_SLOTS, induced)
        .with(COMPILED_PATTERNS, patterns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(yaml: &str) -> SchemaDefinition {
        SchemaDefinition::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_typed_lookup() {
        let artifacts = Artifacts::new().with("answer", 42u32);
        assert_eq!(artifacts.get::<u32>("answer"), Some(&42));
        assert_eq!(artifacts.get::<String>("answer"), None);
        assert_eq!(artifacts.get::<u32>("missing"), None);
    }

    #[test]
    fn test_compile_builds_builtin_artifacts() {
        let s = schema(
            "name: s\nclasses:\n  Base:\n    attributes:\n      code:\n        pattern: '[A-Z]{3}'\n  Child:\n    is_a: Base\n",
        );
        let artifacts = compile(&s).unwrap();
        assert!(artifacts.contains(INDUCED_SLOTS));
        assert!(artifacts.contains(COMPILED_PATTERNS));

        let induced = artifacts.get::<InducedSlots>(INDUCED_SLOTS).unwrap();
        assert_eq!(induced.for_class("Child").len(), 1);
        assert!(induced.for_class("Nope").is_empty());

        let patterns = artifacts.get::<CompiledPatterns>(COMPILED_PATTERNS).unwrap();
        let re = patterns.get("Child", "code").unwrap();
        assert!(re.is_match("ABC"));
        assert!(!re.is_match("ABCD"));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let s = schema("name: s\nclasses:\n  A:\n    attributes:\n      x:\n        pattern: '(['\n");
        let err = compile(&s).unwrap_err();
        assert!(matches!(err, PlumblineError::Configuration(_)));
        assert!(err.to_string().contains("A.x"));
    }
}
