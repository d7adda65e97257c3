//! Loading API description documents.
//!
//! Documents are held as a `serde_json::Value` tree with insertion-ordered
//! maps, whether they were written in JSON or YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{OpenApiError, Result};

/// Source format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(OpenApiError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Guess the format from content.
    pub fn sniff(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Yaml
        }
    }
}

/// Descriptive metadata of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name (chosen by the caller, usually the file stem).
    pub name: String,

    /// `info.description`.
    pub description: String,

    /// `info.version`.
    pub version: String,

    /// `servers[0].url`.
    pub base_url: String,
}

/// A parsed API description.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDocument {
    root: Value,
}

impl ApiDocument {
    /// Wrap an already parsed tree.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(OpenApiError::InvalidDocument(
                "document root must be an object".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// Read a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let text = std::fs::read_to_string(path)?;
        debug!("Loading {format:?} document from {}", path.display());
        Self::parse_as(&text, format)
    }

    /// Parse text, detecting the format from its first character.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_as(text, Format::sniff(text))
    }

    /// Parse text in a known format.
    pub fn parse_as(text: &str, format: Format) -> Result<Self> {
        let root = match format {
            Format::Json => serde_json::from_str(text)?,
            Format::Yaml => yaml_to_json(serde_yaml::from_str(text)?)?,
        };
        Self::from_value(root)
    }

    /// The document tree.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The `paths` object.
    pub fn paths(&self) -> Result<&Map<String, Value>> {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| OpenApiError::InvalidDocument("missing `paths` object".to_string()))
    }

    /// Service metadata; absent fields become empty strings.
    pub fn service_info(&self, name: impl Into<String>) -> ServiceInfo {
        let text = |pointer: &str| {
            self.root
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        ServiceInfo {
            name: name.into(),
            description: text("/info/description"),
            version: text("/info/version"),
            base_url: text("/servers/0/url"),
        }
    }
}

/// Convert a YAML tree into the JSON tree used everywhere else.
///
/// Mapping order is kept. Scalar keys such as response codes (`200:`) are
/// stringified.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::from(u));
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| OpenApiError::InvalidDocument(format!("unrepresentable number: {n}")))
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(OpenApiError::InvalidDocument(format!(
            "unsupported mapping key: {other:?}"
        ))),
    }
}
