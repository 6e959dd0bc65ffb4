//! Chain timestamps.
//!
//! Nodes render `time_point` columns as `2021-03-04T05:06:07.500` without an
//! offset; the value is always UTC. Older rows omit the fractional part.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const WITH_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
const WITHOUT_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const OUTPUT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

pub fn parse(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    let trimmed = value.trim().trim_end_matches('Z');
    PrimitiveDateTime::parse(trimmed, WITH_FRACTION)
        .or_else(|_| PrimitiveDateTime::parse(trimmed, WITHOUT_FRACTION))
        .map(PrimitiveDateTime::assume_utc)
}

pub fn format(value: OffsetDateTime) -> Result<String, time::error::Format> {
    value.format(OUTPUT)
}

/// `#[serde(with = "docgraph_types::timestamp")]`
pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    let text = format(*value).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse(&text).map_err(D::Error::custom)
}
