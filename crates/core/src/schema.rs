//! Typed view of tool parameter schemas.
//!
//! Tool providers describe parameters with JSON Schema. Most of the time the
//! schema is passed to the model untouched as a `serde_json::Value`; this
//! module exists for the places that need to read or adjust it. Only the
//! fields Courier inspects are modelled; everything else round-trips through
//! [`Schema::extra`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// The declared `type` of a schema node.
///
/// `Unspecified` means the node carries no `type` key at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchemaType {
    #[default]
    Unspecified,
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
    /// `"type": ["string", "null"]`
    Multiple(Vec<SchemaType>),
    /// A type name outside the JSON Schema core set, kept verbatim.
    Other(String),
}

impl SchemaType {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }

    fn from_name(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            "null" => Self::Null,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unspecified => "unspecified",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
            Self::Multiple(_) => "multiple",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multiple(types) => {
                let names: Vec<&str> = types.iter().map(Self::as_str).collect();
                write!(f, "{}", names.join("|"))
            }
            other => f.write_str(other.as_str()),
        }
    }
}

impl Serialize for SchemaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unspecified => serializer.serialize_none(),
            Self::Multiple(types) => types.serialize(serializer),
            other => serializer.serialize_str(other.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for SchemaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => Self::Unspecified,
            Some(Raw::One(name)) => Self::from_name(&name),
            Some(Raw::Many(names)) => {
                Self::Multiple(names.iter().map(|n| Self::from_name(n)).collect())
            }
        })
    }
}

/// A JSON Schema node, as far as Courier needs to understand it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "SchemaType::is_unspecified"
    )]
    pub schema_type: SchemaType,

    /// Union alternatives (`anyOf`)
    #[serde(rename = "anyOf", default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Keywords not modelled above (`title`, `default`, `format`, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Schema {
    /// Read a schema node from a JSON value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Declares both a concrete type and a non-empty list of alternatives.
    pub fn is_ambiguous_union(&self) -> bool {
        !self.any_of.is_empty() && !self.schema_type.is_unspecified()
    }
}

/// A named callable as the model sees it: name, description, parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Schema>,
}

impl FunctionDeclaration {
    /// Build a declaration from a raw parameter schema. A `null` schema means
    /// the function takes no parameters.
    pub fn from_parts(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let parameters = if parameters.is_null() {
            None
        } else {
            Some(Schema::from_value(parameters)?)
        };
        Ok(Self {
            name: name.into(),
            description: description.into(),
            parameters,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&Schema> {
        self.parameters.as_ref()?.properties.get(name)
    }

    /// Parameter names in declaration-map order, with whether each is required.
    pub fn parameter_names(&self) -> Vec<(&str, bool)> {
        let Some(params) = &self.parameters else {
            return vec![];
        };
        params
            .properties
            .keys()
            .map(|k| (k.as_str(), params.required.iter().any(|r| r == k)))
            .collect()
    }
}
