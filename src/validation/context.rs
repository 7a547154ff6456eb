//! Run-scoped validation context
//!
//! Holds the schema, target class and artifacts for one run, all read-only,
//! plus the scratch space plugins use for cross-instance bookkeeping.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::artifacts::{self, Artifacts};
use crate::error::{PluginError, PluginResult, PlumblineError, Result, ScratchError};
use crate::schema::SchemaDefinition;

/// Everything plugins may consult while validating one run
#[derive(Debug)]
pub struct ValidationContext {
    schema: Arc<SchemaDefinition>,
    target_class: String,
    artifacts: Artifacts,
    scratch: Scratch,
}

impl ValidationContext {
    /// Create a context.
    ///
    /// With no explicit target class the schema's `tree_root` class is used.
    /// Fails with a configuration error when the class cannot be resolved.
    pub fn new(
        schema: Arc<SchemaDefinition>,
        target_class: Option<&str>,
        artifacts: Artifacts,
    ) -> Result<Self> {
        let target_class = match target_class {
            Some(name) => name.to_string(),
            None => schema.tree_root().map(str::to_string).ok_or_else(|| {
                PlumblineError::Configuration(format!(
                    "no target class given and schema '{}' has no unique tree_root class",
                    schema.name
                ))
            })?,
        };

        if !schema.contains_class(&target_class) {
            return Err(PlumblineError::Configuration(format!(
                "target class '{}' is not defined in schema '{}'",
                target_class, schema.name
            )));
        }

        Ok(Self {
            schema,
            target_class,
            artifacts,
            scratch: Scratch::default(),
        })
    }

    /// Create a context with the builtin artifacts compiled from the schema
    pub fn compile(schema: Arc<SchemaDefinition>, target_class: Option<&str>) -> Result<Self> {
        let artifacts = artifacts::compile(&schema)?;
        Self::new(schema, target_class, artifacts)
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn artifact<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.artifacts.get(key)
    }

    /// Like [`artifact`](Self::artifact) but a miss is a plugin error
    pub fn require_artifact<T: Any + Send + Sync>(&self, key: &str) -> PluginResult<&T> {
        self.artifacts
            .get(key)
            .ok_or_else(|| PluginError::MissingArtifact(key.to_string()))
    }

    /// Scratch space namespace owned by `owner`, normally the plugin name
    pub fn scratch<'a>(&'a self, owner: &'a str) -> ScratchHandle<'a> {
        ScratchHandle {
            scratch: &self.scratch,
            owner,
        }
    }

    /// Read a key from any plugin's namespace
    pub fn peek(&self, owner: &str, key: &str) -> std::result::Result<Option<Value>, ScratchError> {
        self.scratch.read(owner, key)
    }

    /// Allow scratch access; the session calls this right before the first
    /// `pre_process` hook.
    pub(crate) fn open_scratch(&self) {
        self.scratch.open.set(true);
    }
}

/// Run-scoped key-value storage, partitioned by owner.
///
/// Borrows are never held across calls, so interleaved use from several
/// handles cannot conflict.
#[derive(Debug, Default)]
struct Scratch {
    open: Cell<bool>,
    entries: RefCell<HashMap<String, HashMap<String, Value>>>,
}

impl Scratch {
    fn ensure_open(&self) -> std::result::Result<(), ScratchError> {
        if self.open.get() {
            Ok(())
        } else {
            Err(ScratchError::NotOpen)
        }
    }

    fn read(&self, owner: &str, key: &str) -> std::result::Result<Option<Value>, ScratchError> {
        self.ensure_open()?;
        Ok(self
            .entries
            .borrow()
            .get(owner)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn write<R>(
        &self,
        owner: &str,
        f: impl FnOnce(&mut HashMap<String, Value>) -> R,
    ) -> std::result::Result<R, ScratchError> {
        self.ensure_open()?;
        let mut entries = self.entries.borrow_mut();
        Ok(f(entries.entry(owner.to_string()).or_default()))
    }
}

/// Write access to one namespace of the scratch space
#[derive(Debug, Clone, Copy)]
pub struct ScratchHandle<'a> {
    scratch: &'a Scratch,
    owner: &'a str,
}

impl ScratchHandle<'_> {
    pub fn owner(&self) -> &str {
        self.owner
    }

    /// Value for `key`, or `default` when unset
    pub fn get(&self, key: &str, default: Value) -> std::result::Result<Value, ScratchError> {
        Ok(self.scratch.read(self.owner, key)?.unwrap_or(default))
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<Option<T>, ScratchError> {
        match self.scratch.read(self.owner, key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| ScratchError::Value {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> std::result::Result<(), ScratchError> {
        let value = value.into();
        self.scratch.write(self.owner, |ns| {
            ns.insert(key.to_string(), value);
        })
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> std::result::Result<(), ScratchError> {
        let value = serde_json::to_value(value).map_err(|source| ScratchError::Value {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value)
    }

    /// Push onto the array stored at `key`, creating it when unset
    pub fn append(&self, key: &str, value: impl Into<Value>) -> std::result::Result<(), ScratchError> {
        let value = value.into();
        self.scratch.write(self.owner, |ns| {
            match ns.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new())) {
                Value::Array(items) => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(ScratchError::NotAnArray(key.to_string())),
            }
        })?
    }

    pub fn append_as<T: Serialize>(&self, key: &str, value: &T) -> std::result::Result<(), ScratchError> {
        let value = serde_json::to_value(value).map_err(|source| ScratchError::Value {
            key: key.to_string(),
            source,
        })?;
        self.append(key, value)
    }

    /// Remove a key from this namespace; other namespaces are untouchable
    pub fn remove(&self, key: &str) -> std::result::Result<Option<Value>, ScratchError> {
        self.scratch.write(self.owner, |ns| ns.remove(key))
    }
}
