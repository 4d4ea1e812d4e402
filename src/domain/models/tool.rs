//! Tool descriptors and their declared input schemas.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// JSON value types an input property may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    /// Any JSON number.
    Number,
    /// A number with no fractional part.
    Integer,
    /// A JSON string.
    String,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl JsonType {
    /// Lowercase name as it appears in schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Schema of a single named argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    /// Declared value type.
    #[serde(rename = "type")]
    pub kind: JsonType,

    /// Permitted values, when the property is an enumeration.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl PropertySchema {
    /// A property of the given type with no value restriction.
    pub const fn of(kind: JsonType) -> Self {
        Self {
            kind,
            allowed: None,
        }
    }

    /// Shorthand for a number property.
    pub const fn number() -> Self {
        Self::of(JsonType::Number)
    }

    /// Shorthand for a string property.
    pub const fn string() -> Self {
        Self::of(JsonType::String)
    }

    /// Restrict a string property to a fixed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Marker for the `"type": "object"` root of every input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaRoot {
    /// The only root kind.
    #[default]
    #[serde(rename = "object")]
    Object,
}

/// Declared argument shape of a tool.
///
/// Properties are kept in a sorted map so that serialization is stable
/// across calls and processes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub root: SchemaRoot,

    /// Named properties.
    pub properties: BTreeMap<String, PropertySchema>,

    /// Names that must be present in the arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// A way in which arguments fail to match an [`InputSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// A required property was absent.
    #[error("missing required argument '{0}'")]
    MissingRequired(String),

    /// A property had the wrong JSON type.
    #[error("argument '{property}' must be of type {expected}, got {found}")]
    WrongType {
        /// Offending property.
        property: String,
        /// Declared type.
        expected: JsonType,
        /// Type actually supplied.
        found: &'static str,
    },

    /// A value fell outside its enumeration.
    #[error("argument '{property}' must be one of [{}], got {value}", .allowed.join(", "))]
    NotAllowed {
        /// Offending property.
        property: String,
        /// The rejected value, as JSON text.
        value: String,
        /// Values the property accepts.
        allowed: Vec<String>,
    },
}

impl InputSchema {
    /// An object schema with no properties.
    pub fn object() -> Self {
        Self::default()
    }

    /// Declare a property that must be supplied.
    pub fn require(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        self.required.push(name);
        self
    }

    /// Declare a property that may be omitted.
    pub fn optional(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Check `arguments` against the declared properties.
    ///
    /// Required properties must be present; declared properties must match
    /// their type and enumeration. Undeclared properties are ignored.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), SchemaViolation> {
        for name in &self.required {
            match arguments.get(name) {
                None | Some(Value::Null) => {
                    return Err(SchemaViolation::MissingRequired(name.clone()));
                }
                Some(_) => {}
            }
        }

        for (name, property) in &self.properties {
            let Some(value) = arguments.get(name) else {
                continue;
            };

            if value.is_null() && !self.required.contains(name) {
                continue;
            }

            if !property.kind.matches(value) {
                return Err(SchemaViolation::WrongType {
                    property: name.clone(),
                    expected: property.kind,
                    found: describe_value(value),
                });
            }

            if let Some(allowed) = &property.allowed {
                let accepted = value
                    .as_str()
                    .is_some_and(|s| allowed.iter().any(|a| a == s));
                if !accepted {
                    return Err(SchemaViolation::NotAllowed {
                        property: name.clone(),
                        value: value.to_string(),
                        allowed: allowed.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Immutable description of one invocable tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable summary.
    pub description: String,
    /// Shape of the accepted arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    /// Build a descriptor.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}
