//! Upstream chain entities.
//!
//! The remote node serves loosely-typed JSON: numeric fields arrive as
//! numbers or decimal strings depending on magnitude, and new fields appear
//! across node versions. Blocks and transactions are therefore kept as raw
//! JSON objects with typed accessors for the structural fields the sync
//! engine depends on. Only structural problems (a missing id, a non-object
//! payload) are errors; value-shape surprises never are.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Missing field `{0}`")]
    MissingField(&'static str),
    #[error("Field `{field}` is not a {expected}")]
    FieldType { field: &'static str, expected: &'static str },
    #[error("Expected a JSON object")]
    NotAnObject,
}

/// `GET /info` payload of the remote node. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeInfo {
    /// `indep_hash` of the node's current tip.
    pub current: String,
    /// Height of the tip.
    pub height: u64,
}

/// A name/value pair attached to a transaction at a positional index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A block as served by the remote node, kept as its raw JSON object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ChainBlock(pub Map<String, Value>);

impl ChainBlock {
    pub fn from_value(value: Value) -> Result<Self, ChainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ChainError::NotAnObject),
        }
    }

    /// The canonical id of this block.
    pub fn indep_hash(&self) -> Result<&str, ChainError> {
        str_field(&self.0, "indep_hash")
    }

    /// Height along the canonical chain.
    pub fn height(&self) -> Result<u64, ChainError> {
        u64_field(&self.0, "height")
    }

    /// Parent id. The genesis block has none.
    pub fn previous_block(&self) -> Option<&str> {
        self.0.get("previous_block").and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Unix seconds, coerced permissively (missing or malformed yields 0).
    pub fn timestamp(&self) -> i64 {
        self.0.get("timestamp").map(json_long).unwrap_or(0)
    }

    /// Ids of the transactions contained in this block, in order.
    pub fn txs(&self) -> Vec<String> {
        match self.0.get("txs") {
            Some(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn tags(&self) -> Vec<Tag> {
        tags_field(&self.0)
    }

    /// Detached proof-of-access substructure, when present.
    pub fn poa(&self) -> Option<&Map<String, Value>> {
        self.0.get("poa").and_then(Value::as_object)
    }

    /// Every raw field, in upstream order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A transaction as served by the remote node, kept as its raw JSON object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ChainTransaction(pub Map<String, Value>);

impl ChainTransaction {
    pub fn from_value(value: Value) -> Result<Self, ChainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ChainError::NotAnObject),
        }
    }

    pub fn id(&self) -> Result<&str, ChainError> {
        str_field(&self.0, "id")
    }

    pub fn tags(&self) -> Vec<Tag> {
        tags_field(&self.0)
    }

    /// Payload size in bytes, coerced permissively.
    pub fn data_size(&self) -> i64 {
        self.0.get("data_size").map(json_long).unwrap_or(0)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Coerces a loose JSON value to a signed 64-bit integer: null and the empty
/// string become 0, decimal strings are parsed, numbers are cast. Anything
/// else also collapses to 0, value-shape surprises are not errors.
pub fn json_long(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) if s.is_empty() => 0,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ChainError> {
    match map.get(field) {
        None => Err(ChainError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ChainError::FieldType { field, expected: "string" }),
    }
}

fn u64_field(map: &Map<String, Value>, field: &'static str) -> Result<u64, ChainError> {
    match map.get(field) {
        None => Err(ChainError::MissingField(field)),
        Some(Value::Number(n)) => n.as_u64().ok_or(ChainError::FieldType { field, expected: "unsigned integer" }),
        // Heights above 2^53 arrive as decimal strings.
        Some(Value::String(s)) => s.parse().map_err(|_| ChainError::FieldType { field, expected: "unsigned integer" }),
        Some(_) => Err(ChainError::FieldType { field, expected: "unsigned integer" }),
    }
}

fn tags_field(map: &Map<String, Value>) -> Vec<Tag> {
    match map.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                Some(Tag::new(obj.get("name")?.as_str()?, obj.get("value")?.as_str()?))
            })
            .collect(),
        _ => Vec::new(),
    }
}
