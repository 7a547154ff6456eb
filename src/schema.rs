//! Resolved schema model.
//!
//! A deliberately small metamodel: classes with single inheritance and
//! attributes, plus enumerations. Schemas are read from YAML (or JSON) and
//! resolved once; the validation core only ever sees the resolved form.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PlumblineError, Result};

/// A resolved schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub classes: IndexMap<String, ClassDefinition>,
    #[serde(default)]
    pub enums: IndexMap<String, EnumDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassDefinition {
    /// Filled from the map key when the schema is resolved
    pub name: String,
    pub description: Option<String>,
    pub is_a: Option<String>,
    pub tree_root: bool,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub attributes: IndexMap<String, SlotDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotDefinition {
    /// Filled from the map key when the schema is resolved
    pub name: String,
    pub description: Option<String>,
    /// Builtin type, enum name or class name; `string` when omitted
    pub range: Option<String>,
    pub required: bool,
    pub recommended: bool,
    pub multivalued: bool,
    pub identifier: bool,
    pub pattern: Option<String>,
    pub minimum_value: Option<f64>,
    pub maximum_value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumDefinition {
    pub description: Option<String>,
    pub permissible_values: IndexMap<String, Option<PermissibleValue>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissibleValue {
    pub description: Option<String>,
}

/// What a slot's range resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind<'a> {
    String,
    Integer,
    Float,
    Boolean,
    Enum(&'a str),
    Class(&'a str),
    /// Named range that is neither builtin nor defined in the schema
    Unknown(&'a str),
}

impl SchemaDefinition {
    /// Parse and resolve a schema from YAML (JSON is accepted too)
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let schema: Self = serde_yaml::from_str(content)?;
        schema.resolve()
    }

    /// Load and resolve a schema file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let schema = Self::from_yaml_str(&content).map_err(|e| match e {
            PlumblineError::Configuration(msg) => {
                PlumblineError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        log::info!(
            "Loaded schema '{}' ({} classes, {} enums) from {}",
            schema.name,
            schema.classes.len(),
            schema.enums.len(),
            path.display()
        );
        Ok(schema)
    }

    /// Fill names from map keys and check inheritance references
    pub fn resolve(mut self) -> Result<Self> {
        for (class_name, class) in self.classes.iter_mut() {
            class.name = class_name.clone();
            for (slot_name, slot) in class.attributes.iter_mut() {
                slot.name = slot_name.clone();
            }
        }

        for class in self.classes.values() {
            if let Some(parent) = &class.is_a {
                if !self.classes.contains_key(parent) {
                    return Err(PlumblineError::Configuration(format!(
                        "class '{}' inherits from unknown class '{}'",
                        class.name, parent
                    )));
                }
            }
            // Walking the chain detects cycles
            self.ancestors(&class.name)?;
        }

        Ok(self)
    }

    pub fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.get(name)
    }

    pub fn contains_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(name)
    }

    /// The single class flagged `tree_root`, if exactly one is
    pub fn tree_root(&self) -> Option<&str> {
        let mut roots = self.classes.values().filter(|c| c.tree_root);
        match (roots.next(), roots.next()) {
            (Some(root), None) => Some(root.name.as_str()),
            _ => None,
        }
    }

    /// Class chain from the root ancestor down to `name`
    pub fn ancestors(&self, name: &str) -> Result<Vec<&ClassDefinition>> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(class_name) = current {
            let class = self.classes.get(class_name).ok_or_else(|| {
                PlumblineError::Configuration(format!("unknown class '{}'", class_name))
            })?;
            if chain.iter().any(|c: &&ClassDefinition| c.name == class.name) {
                return Err(PlumblineError::Configuration(format!(
                    "inheritance cycle through class '{}'",
                    class.name
                )));
            }
            chain.push(class);
            current = class.is_a.as_deref();
        }
        chain.reverse();
        Ok(chain)
    }

    /// All slots of a class including inherited ones; a subclass attribute
    /// replaces the inherited attribute of the same name in place.
    pub fn induced_slots(&self, class_name: &str) -> Result<Vec<SlotDefinition>> {
        let mut slots: IndexMap<String, SlotDefinition> = IndexMap::new();
        for class in self.ancestors(class_name)? {
            for (name, slot) in &class.attributes {
                slots.insert(name.clone(), slot.clone());
            }
        }
        Ok(slots.into_values().collect())
    }

    pub fn range_kind<'a>(&'a self, slot: &'a SlotDefinition) -> RangeKind<'a> {
        match slot.range.as_deref() {
            None | Some("string") | Some("str") | Some("uri") | Some("date") | Some("datetime") => {
                RangeKind::String
            }
            Some("integer") | Some("int") => RangeKind::Integer,
            Some("float") | Some("double") | Some("decimal") => RangeKind::Float,
            Some("boolean") | Some("bool") => RangeKind::Boolean,
            Some(name) if self.enums.contains_key(name) => RangeKind::Enum(name),
            Some(name) if self.classes.contains_key(name) => RangeKind::Class(name),
            Some(name) => RangeKind::Unknown(name),
        }
    }
}
