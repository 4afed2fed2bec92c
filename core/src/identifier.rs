//! Identifier normalization.
//!
//! Callers describe what they want data for in several shapes: a bare string,
//! an `(address, zipcode, meta)` tuple, a JSON object, or a list mixing those.
//! `normalize` turns any of them into an ordered list of `Identifier`s, the
//! canonical JSON objects the API accepts, validated against a per-kind key
//! schema.
//!
//! Output order always mirrors input order. Without `meta`, position is the
//! only way to correlate request items with response items.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// The four identifier families the API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Property,
    Block,
    Zip,
    Msa,
}

struct KindSchema {
    label: &'static str,
    /// At least one of these must be present.
    primary: &'static [&'static str],
    optional: &'static [&'static str],
    /// Key a bare string is assigned to.
    scalar_key: &'static str,
    result_info_key: &'static str,
}

const PROPERTY_SCHEMA: KindSchema = KindSchema {
    label: "property",
    primary: &["address", "slug"],
    optional: &[
        "zipcode",
        "unit",
        "city",
        "state",
        "meta",
        "client_value",
        "client_value_sqft",
    ],
    scalar_key: "slug",
    result_info_key: "address_info",
};

const BLOCK_SCHEMA: KindSchema = KindSchema {
    label: "block",
    primary: &["block_id"],
    optional: &["num_bins", "property_type", "meta"],
    scalar_key: "block_id",
    result_info_key: "block_info",
};

const ZIP_SCHEMA: KindSchema = KindSchema {
    label: "zip",
    primary: &["zipcode"],
    optional: &["meta"],
    scalar_key: "zipcode",
    result_info_key: "zipcode_info",
};

const MSA_SCHEMA: KindSchema = KindSchema {
    label: "msa",
    primary: &["msa"],
    optional: &["meta"],
    scalar_key: "msa",
    result_info_key: "msa_info",
};

impl IdentifierKind {
    fn schema(self) -> &'static KindSchema {
        match self {
            IdentifierKind::Property => &PROPERTY_SCHEMA,
            IdentifierKind::Block => &BLOCK_SCHEMA,
            IdentifierKind::Zip => &ZIP_SCHEMA,
            IdentifierKind::Msa => &MSA_SCHEMA,
        }
    }

    /// Endpoint prefix for this kind: `property`, `block`, `zip` or `msa`.
    pub fn label(self) -> &'static str {
        self.schema().label
    }

    /// Key of the identity block in each response item (`address_info`, ...).
    pub fn result_info_key(self) -> &'static str {
        self.schema().result_info_key
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "property" => Some(IdentifierKind::Property),
            "block" => Some(IdentifierKind::Block),
            "zip" => Some(IdentifierKind::Zip),
            "msa" => Some(IdentifierKind::Msa),
            _ => None,
        }
    }

    pub fn is_allowed_key(self, key: &str) -> bool {
        let schema = self.schema();
        schema.primary.contains(&key) || schema.optional.contains(&key)
    }

    fn invalid_shape_message(self) -> String {
        match self {
            IdentifierKind::Property => "Input is invalid. Must be a list of (address, zipcode) tuples, \
                 or a dict or list of dicts with each item containing at least an 'address' or 'slug' key."
                .to_string(),
            other => format!(
                "Input is invalid. Must be a dict or list of dicts with each item containing at least '{}' key.",
                other.schema().primary[0]
            ),
        }
    }
}

/// Caller input in any of the accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierInput {
    /// A slug, block id, zipcode or MSA code depending on the kind.
    Text(String),
    /// Positional `(address, zipcode, meta)`. Property only.
    Tuple {
        address: String,
        zipcode: Option<String>,
        meta: Option<String>,
    },
    Map(Map<String, Value>),
    List(Vec<IdentifierInput>),
}

impl IdentifierInput {
    /// Interpret a JSON value: strings become `Text`, objects `Map`, arrays
    /// `List`. Any other JSON type is rejected.
    pub fn from_json(value: Value) -> Result<Self, ApiError> {
        match value {
            Value::String(text) => Ok(IdentifierInput::Text(text)),
            Value::Object(map) => Ok(IdentifierInput::Map(map)),
            Value::Array(items) => items
                .into_iter()
                .map(IdentifierInput::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(IdentifierInput::List),
            other => Err(ApiError::InvalidInput(format!(
                "identifier must be a string, object or list, got {other}"
            ))),
        }
    }
}

impl From<&str> for IdentifierInput {
    fn from(value: &str) -> Self {
        IdentifierInput::Text(value.to_string())
    }
}

impl From<String> for IdentifierInput {
    fn from(value: String) -> Self {
        IdentifierInput::Text(value)
    }
}

impl From<(&str, &str)> for IdentifierInput {
    fn from((address, zipcode): (&str, &str)) -> Self {
        IdentifierInput::Tuple {
            address: address.to_string(),
            zipcode: Some(zipcode.to_string()),
            meta: None,
        }
    }
}

impl From<(&str, &str, &str)> for IdentifierInput {
    fn from((address, zipcode, meta): (&str, &str, &str)) -> Self {
        IdentifierInput::Tuple {
            address: address.to_string(),
            zipcode: Some(zipcode.to_string()),
            meta: Some(meta.to_string()),
        }
    }
}

impl From<Map<String, Value>> for IdentifierInput {
    fn from(value: Map<String, Value>) -> Self {
        IdentifierInput::Map(value)
    }
}

impl From<Identifier> for IdentifierInput {
    fn from(value: Identifier) -> Self {
        IdentifierInput::Map(value.fields)
    }
}

impl<T: Into<IdentifierInput>> From<Vec<T>> for IdentifierInput {
    fn from(items: Vec<T>) -> Self {
        IdentifierInput::List(items.into_iter().map(Into::into).collect())
    }
}

/// A validated identifier object, serialized exactly as its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    kind: IdentifierKind,
    fields: Map<String, Value>,
}

impl Identifier {
    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn meta(&self) -> Option<&Value> {
        self.fields.get("meta")
    }

    /// Fields rendered as query parameters for a single-identifier GET.
    /// Null values are left out.
    pub fn query_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.fields
            .iter()
            .filter_map(|(key, value)| query_value(value).map(|v| (key.clone(), v)))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Coerce `input` into a non-empty, ordered list of validated identifiers.
pub fn normalize(
    kind: IdentifierKind,
    input: impl Into<IdentifierInput>,
) -> Result<Vec<Identifier>, ApiError> {
    match input.into() {
        IdentifierInput::List(items) => {
            if items.is_empty() {
                return Err(ApiError::InvalidInput(
                    "a non-empty list of identifiers is required".to_string(),
                ));
            }
            items.into_iter().map(|item| coerce(kind, item)).collect()
        }
        single => Ok(vec![coerce(kind, single)?]),
    }
}

fn coerce(kind: IdentifierKind, input: IdentifierInput) -> Result<Identifier, ApiError> {
    let fields = match input {
        IdentifierInput::Text(text) => {
            if text.is_empty() {
                return Err(ApiError::InvalidInput(
                    "a non-empty identifier is required".to_string(),
                ));
            }
            let mut fields = Map::new();
            fields.insert(kind.schema().scalar_key.to_string(), Value::String(text));
            fields
        }
        IdentifierInput::Tuple {
            address,
            zipcode,
            meta,
        } => {
            if kind != IdentifierKind::Property || address.is_empty() {
                return Err(ApiError::InvalidInput(kind.invalid_shape_message()));
            }
            let mut fields = Map::new();
            fields.insert("address".to_string(), Value::String(address));
            if let Some(zipcode) = zipcode {
                fields.insert("zipcode".to_string(), Value::String(zipcode));
            }
            if let Some(meta) = meta {
                fields.insert("meta".to_string(), Value::String(meta));
            }
            fields
        }
        IdentifierInput::Map(fields) => {
            validate_map(kind, &fields)?;
            fields
        }
        IdentifierInput::List(_) => {
            return Err(ApiError::InvalidInput(
                "nested identifier lists are not supported".to_string(),
            ))
        }
    };
    Ok(Identifier { kind, fields })
}

fn validate_map(kind: IdentifierKind, fields: &Map<String, Value>) -> Result<(), ApiError> {
    let schema = kind.schema();
    for (key, value) in fields {
        if !kind.is_allowed_key(key) {
            return Err(ApiError::InvalidInput(format!(
                "Key in {} input not allowed: {key}",
                schema.label
            )));
        }
        if value.is_array() || value.is_object() {
            return Err(ApiError::InvalidInput(format!(
                "Value for key {key} must be a string, number or boolean"
            )));
        }
    }
    let has_primary = schema
        .primary
        .iter()
        .any(|key| fields.get(*key).is_some_and(|value| !value.is_null()));
    if !has_primary {
        return Err(ApiError::InvalidInput(kind.invalid_shape_message()));
    }
    Ok(())
}
