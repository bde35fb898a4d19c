//! Driver self-description.
//!
//! A driver answers `meta.describe` with the document below. The server
//! relays it in a `meta` frame; the client builds its command catalog from
//! `commands`. Decoding is lenient: only a command's `name` is mandatory.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full metadata document of a driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverMeta {
    pub schema_version: String,
    pub info: DriverInfo,
    /// Driver configuration schema (opaque to the session engine).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    pub commands: Vec<CommandMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

impl DriverMeta {
    pub fn command(&self, name: &str) -> Option<&CommandMeta> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// Descriptive information about a driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
}

/// One invocable command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub params: Vec<FieldMeta>,
    #[serde(default)]
    pub returns: ReturnMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
    /// UI hints (opaque).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
}

impl CommandMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            title: None,
            summary: None,
            params: Vec::new(),
            returns: ReturnMeta::default(),
            events: Vec::new(),
            errors: Vec::new(),
            examples: Vec::new(),
            ui: None,
        }
    }

    /// Parameters the driver marks as required.
    pub fn required_params(&self) -> impl Iterator<Item = &FieldMeta> {
        self.params.iter().filter(|p| p.required)
    }
}

/// Describes one parameter or result field.
///
/// Schema keys this type does not model (constraints, ui hints, nested
/// items) are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a command returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnMeta {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldMeta>,
}

/// An event a command may stream before its terminal response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldMeta>,
}
