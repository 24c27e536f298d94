//! # Tool Catalog
//!
//! Declarations of the tools advertised to the model. The catalog only
//! describes tools; it never executes them or checks they exist anywhere.
//!
//! Declarations can be written by hand, deserialized from JSON, imported from a
//! JSON-Schema `properties` object, or derived from a Rust type through
//! `schemars`.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// Unknown or unspecified type
    #[default]
    #[serde(other)]
    Any,
}

impl ParamType {
    /// Token rendered into the interface declaration
    pub fn token(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "any[]",
            ParamType::Any => "any",
        }
    }

    /// Map a JSON-Schema `type` keyword onto a parameter type
    fn from_schema_type(schema_type: &Value) -> Self {
        let name = match schema_type {
            Value::String(s) => Some(s.as_str()),
            // Nullable unions such as ["string", "null"]
            Value::Array(types) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null"),
            _ => None,
        };
        match name {
            Some("string") => ParamType::String,
            Some("number") | Some("integer") => ParamType::Number,
            Some("boolean") => ParamType::Boolean,
            Some("object") => ParamType::Object,
            Some("array") => ParamType::Array,
            _ => ParamType::Any,
        }
    }
}

/// One parameter of a tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    #[serde(rename = "type", default)]
    pub kind: ParamType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ToolParameter {
    pub fn new(kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }
}

/// Description of one invocable tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Unique name within a catalog
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Parameters keyed by name
    #[serde(default)]
    pub parameters: BTreeMap<String, ToolParameter>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter to this declaration
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters
            .insert(name.into(), ToolParameter::new(kind, description));
        self
    }

    /// Build a declaration from a JSON-Schema object describing the arguments
    ///
    /// Only the top-level `properties` are read; each property contributes its
    /// `type` and `description`. Anything the schema does not pin down to one
    /// of the known types becomes `any`.
    pub fn from_json_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Self {
        let parameters = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(param, spec)| {
                        let kind = spec
                            .get("type")
                            .map(ParamType::from_schema_type)
                            .unwrap_or_default();
                        let description = spec
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        (param.clone(), ToolParameter::new(kind, description))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Derive a declaration from the JSON schema of an argument type
    pub fn from_schema_type<T: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let schema = serde_json::to_value(schemars::schema_for!(T))?;
        Ok(Self::from_json_schema(name, description, &schema))
    }
}

/// Ordered set of tool declarations with unique names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ToolDeclaration>", into = "Vec<ToolDeclaration>")]
pub struct ToolCatalog {
    tools: Vec<ToolDeclaration>,
}

impl ToolCatalog {
    /// Create a catalog, failing if two declarations share a name
    pub fn new(tools: Vec<ToolDeclaration>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::DuplicateToolName(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// Append a declaration, failing if the name is already taken
    pub fn push(&mut self, tool: ToolDeclaration) -> Result<()> {
        if self.get(&tool.name).is_some() {
            return Err(Error::DuplicateToolName(tool.name));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a declaration by name
    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Declarations in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ToolDeclaration> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl TryFrom<Vec<ToolDeclaration>> for ToolCatalog {
    type Error = Error;

    fn try_from(tools: Vec<ToolDeclaration>) -> Result<Self> {
        Self::new(tools)
    }
}

impl From<ToolCatalog> for Vec<ToolDeclaration> {
    fn from(catalog: ToolCatalog) -> Self {
        catalog.tools
    }
}
