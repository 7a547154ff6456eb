//! Validation findings

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::{Instance, SourceRef};

/// Severity of a finding; ordered so that `Error > Warning > Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Whether a result describes the instance or a plugin malfunction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    #[default]
    Finding,
    /// Synthetic result recorded when a plugin faulted on an instance
    InternalError,
}

/// Location of a finding inside an instance, rendered as a JSON pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// The instance itself
    pub fn root() -> Self {
        Self::default()
    }

    /// A top-level field
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(index.to_string());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl From<String> for FieldPath {
    fn from(pointer: String) -> Self {
        let segments = pointer
            .split('/')
            .skip(1)
            .filter(|s| !s.is_empty())
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect();
        Self { segments }
    }
}

/// One finding about one instance.
///
/// Fields are private; a result is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    severity: Severity,
    #[serde(default)]
    kind: ResultKind,
    message: String,
    location: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instantiates: Option<String>,
}

impl ValidationResult {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind: ResultKind::Finding,
            message: message.into(),
            location: FieldPath::root(),
            rule: None,
            instantiates: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Synthetic result standing in for a plugin fault
    pub fn internal_error(plugin: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::InternalError,
            ..Self::error(message).with_rule(plugin)
        }
    }

    pub fn at(mut self, location: FieldPath) -> Self {
        self.location = location;
        self
    }

    /// Tag naming the plugin or rule that produced the finding
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Class the instance was validated as
    pub fn instantiates(mut self, class_name: impl Into<String>) -> Self {
        self.instantiates = Some(class_name.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &FieldPath {
        &self.location
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.instantiates.as_deref()
    }

    /// Pair this result with the instance that produced it
    pub fn for_instance(self, instance: &Instance) -> ValidationResultWithSource {
        ValidationResultWithSource::new(self, instance.source().clone())
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.location, self.message)?;
        if let Some(rule) = &self.rule {
            write!(f, " ({})", rule)?;
        }
        Ok(())
    }
}

/// A result paired with a stable reference to its source instance.
///
/// Plugins build these at yield time, so provenance never depends on which
/// instance the caller happens to be iterating when the result is drained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResultWithSource {
    pub result: ValidationResult,
    pub source: SourceRef,
}

impl ValidationResultWithSource {
    pub fn new(result: ValidationResult, source: SourceRef) -> Self {
        Self { result, source }
    }
}
