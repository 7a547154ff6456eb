//! Instances under validation and the stable references that tie findings
//! back to them.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{PlumblineError, Result};

/// Stable reference to one instance of a run.
///
/// Equality covers the arrival index, the origin label and the content
/// fingerprint, so a result can only match the exact instance it was
/// produced for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Position of the instance in the run's arrival order
    pub index: usize,
    /// Where the instance came from (e.g. `people.yaml#2`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// SHA-256 of the instance's canonical JSON encoding
    pub fingerprint: String,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "#{} ({})", self.index, origin),
            None => write!(f, "#{}", self.index),
        }
    }
}

/// One structured record: a mapping from field name to value.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    source: SourceRef,
    data: Map<String, Value>,
}

impl Instance {
    /// Create an instance from a field map
    pub fn new(data: Map<String, Value>) -> Self {
        let fingerprint = fingerprint(&data);
        Self {
            source: SourceRef {
                index: 0,
                origin: None,
                fingerprint,
            },
            data,
        }
    }

    /// Create an instance from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            other => Err(PlumblineError::InvalidInstance(format!(
                "expected an object, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Attach an origin label (builder pattern)
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.source.origin = Some(origin.into());
        self
    }

    /// The stable reference findings use to point back at this instance
    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Value of a field; `None` when absent
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// True when the field is present with a non-null value
    pub fn has(&self, field: &str) -> bool {
        self.data.get(field).is_some_and(|v| !v.is_null())
    }

    /// Stamp the arrival index; only the session assigns it
    pub(crate) fn set_index(&mut self, index: usize) {
        self.source.index = index;
    }
}

fn fingerprint(data: &Map<String, Value>) -> String {
    // serde_json's default map is ordered by key, so this encoding is canonical
    let encoded = serde_json::to_vec(data).unwrap_or_default();
    hex::encode(Sha256::digest(&encoded))
}

/// Human-readable name of a JSON value's type
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Load instances from a YAML or JSON file.
///
/// A file holds either one object or a list of objects. Each instance is
/// labelled with the file path, plus `#n` for list entries.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<Instance>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let value: Value = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };

    let label = path.display().to_string();
    let instances = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Instance::from_value(item)
                    .map(|inst| inst.with_origin(format!("{}#{}", label, i)))
                    .map_err(|e| PlumblineError::InvalidInstance(format!("{}#{}: {}", label, i, e)))
            })
            .collect::<Result<Vec<_>>>()?,
        other => vec![Instance::from_value(other)?.with_origin(label.clone())],
    };

    log::debug!("Loaded {} instance(s) from {}", instances.len(), label);
    Ok(instances)
}
