//! Typed column values and the adapter from loose upstream JSON.
//!
//! The adapter never fails on value shape: anything it cannot make sense of
//! collapses to an absent value and gets filtered out of the insert by the
//! statement builder.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;
use wp_chain::Tag;

pub use wp_chain::json_long as to_long;

/// Node id embedded in generated time-based UUIDs.
const TIME_UUID_NODE_ID: [u8; 6] = *b"wvgate";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CqlValue {
    Null,
    Bigint(i64),
    Boolean(bool),
    Text(String),
    Timeuuid(Uuid),
    Tuple(Vec<CqlValue>),
    List(Vec<CqlValue>),
    Set(Vec<CqlValue>),
}

impl CqlValue {
    /// Values treated as "no value" by the insert builders, so that the
    /// statement text only names columns that actually carry data.
    pub fn is_absent(&self) -> bool {
        matches!(self, CqlValue::Null) || matches!(self, CqlValue::Text(s) if s.is_empty())
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            CqlValue::Bigint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for CqlValue {
    fn from(value: i64) -> Self {
        CqlValue::Bigint(value)
    }
}

impl From<&str> for CqlValue {
    fn from(value: &str) -> Self {
        CqlValue::Text(value.to_string())
    }
}

impl From<String> for CqlValue {
    fn from(value: String) -> Self {
        CqlValue::Text(value)
    }
}

impl From<Uuid> for CqlValue {
    fn from(value: Uuid) -> Self {
        CqlValue::Timeuuid(value)
    }
}

/// Declared type of a projected column, driving the JSON adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColType {
    Bigint,
    Text,
    TextList,
    TagSet,
}

/// Adapts a loose upstream value into a column value of the declared type.
pub fn adapt(ty: ColType, raw: &Value) -> CqlValue {
    match ty {
        ColType::Bigint => CqlValue::Bigint(to_long(raw)),
        ColType::Text => match raw {
            Value::Null => CqlValue::Null,
            Value::String(s) => CqlValue::Text(s.clone()),
            Value::Number(n) => CqlValue::Text(n.to_string()),
            Value::Bool(b) => CqlValue::Text(b.to_string()),
            other => {
                tracing::debug!("Cannot adapt {other} to a text column, skipping");
                CqlValue::Null
            }
        },
        ColType::TextList => match raw {
            Value::Array(items) => CqlValue::List(
                items.iter().filter_map(Value::as_str).map(|s| CqlValue::Text(s.to_string())).collect(),
            ),
            _ => CqlValue::List(Vec::new()),
        },
        ColType::TagSet => match raw {
            Value::Array(items) => {
                let tags: Vec<Tag> = items
                    .iter()
                    .filter_map(|item| {
                        let obj = item.as_object()?;
                        Some(Tag::new(obj.get("name")?.as_str()?, obj.get("value")?.as_str()?))
                    })
                    .collect();
                tag_set(&tags)
            }
            _ => tag_set(&[]),
        },
    }
}

/// Maps an ordered tag list into an unordered set of `(name, value)` 2-tuples.
/// Duplicate pairs collapse. An empty input yields an empty list value, the
/// shape the column type expects for "no tags".
pub fn tag_set(tags: &[Tag]) -> CqlValue {
    if tags.is_empty() {
        return CqlValue::List(Vec::new());
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        if seen.insert((tag.name.as_str(), tag.value.as_str())) {
            out.push(CqlValue::Tuple(vec![
                CqlValue::Text(tag.name.clone()),
                CqlValue::Text(tag.value.clone()),
            ]));
        }
    }
    CqlValue::Set(out)
}

/// A v1 UUID carrying `unix_secs`, sortable by the embedded time.
pub fn time_uuid(unix_secs: i64) -> Uuid {
    let ts = uuid::Timestamp::from_unix(uuid::NoContext, unix_secs.max(0) as u64, 0);
    Uuid::new_v1(ts, &TIME_UUID_NODE_ID)
}

/// Extracts the unix seconds embedded in a time-based UUID string. Returns
/// `None` for unparseable input or UUID versions without a timestamp.
pub fn time_uuid_unix_secs(s: &str) -> Option<i64> {
    let uuid = Uuid::parse_str(s).ok()?;
    let (secs, _nanos) = uuid.get_timestamp()?.to_unix();
    Some(secs as i64)
}
