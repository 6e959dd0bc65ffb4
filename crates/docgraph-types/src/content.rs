use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::DocumentError;

/// Typed payload of a single content item.
///
/// The chain encodes each value as a two element array whose first element
/// names the variant, e.g. `["name", "dao.hypha"]` or `["int64", 42]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentValue {
    Name(String),
    String(String),
    Asset(String),
    Int64(i64),
    TimePoint(String),
    Checksum256(String),
}

impl ContentValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ContentValue::Name(_) => "name",
            ContentValue::String(_) => "string",
            ContentValue::Asset(_) => "asset",
            ContentValue::Int64(_) => "int64",
            ContentValue::TimePoint(_) => "time_point",
            ContentValue::Checksum256(_) => "checksum256",
        }
    }

    /// Text form of the value, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentValue::Name(value)
            | ContentValue::String(value)
            | ContentValue::Asset(value)
            | ContentValue::TimePoint(value)
            | ContentValue::Checksum256(value) => Some(value),
            ContentValue::Int64(_) => None,
        }
    }

    fn from_tagged(kind: &str, value: Value) -> Result<Self, DocumentError> {
        let text = |value: Value| match value {
            Value::String(text) => Ok(text),
            other => Err(DocumentError::InvalidContentValue {
                kind: kind.to_string(),
                detail: format!("expected a string, found `{other}`"),
            }),
        };

        match kind {
            "name" => text(value).map(ContentValue::Name),
            "string" => text(value).map(ContentValue::String),
            "asset" => text(value).map(ContentValue::Asset),
            "time_point" => text(value).map(ContentValue::TimePoint),
            "checksum256" => text(value).map(ContentValue::Checksum256),
            "int64" => parse_int(&value)
                .map(ContentValue::Int64)
                .ok_or_else(|| DocumentError::InvalidContentValue {
                    kind: kind.to_string(),
                    detail: format!("expected an integer, found `{value}`"),
                }),
            other => Err(DocumentError::UnknownContentType(other.to_string())),
        }
    }

    fn to_tagged(&self) -> RawContentValue {
        let value = match self {
            ContentValue::Int64(number) => Value::from(*number),
            other => Value::String(other.as_text().unwrap_or_default().to_string()),
        };
        RawContentValue(self.kind().to_string(), value)
    }
}

// Large int64 values are sometimes rendered as strings by the node's ABI serializer.
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for ContentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentValue::Int64(number) => write!(f, "{number}"),
            other => f.write_str(other.as_text().unwrap_or_default()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawContentValue(String, Value);

impl Serialize for ContentValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tagged().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RawContentValue(kind, value) = RawContentValue::deserialize(deserializer)?;
        ContentValue::from_tagged(&kind, value).map_err(D::Error::custom)
    }
}

/// One labelled value inside a content group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub label: String,
    pub value: ContentValue,
}

pub type ContentGroup = Vec<Content>;
