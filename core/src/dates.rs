//! Lenient timestamp parsing for backend payloads.
//!
//! Different endpoints emit different precisions for the same kind of
//! timestamp. `normalize` tries each accepted shape in a fixed order, most
//! specific first, and returns the first match. Every shape is read as UTC,
//! whatever the host timezone. Each shape must consume the whole input.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::error::UnparseableDate;

/// One accepted timestamp shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `2025-09-06T21:35:55.818556`
    IsoMicros,
    /// `2025-09-06T21:35:55.818`
    IsoMillis,
    /// `2025-09-06T21:35:55`
    IsoSeconds,
    /// `2025-09-06 21:35:55`
    SpaceSeconds,
    /// `2025-09-06`, read as midnight UTC.
    DateOnly,
}

/// Attempt order. Earlier entries win.
pub const FORMATS: [DateFormat; 5] = [
    DateFormat::IsoMicros,
    DateFormat::IsoMillis,
    DateFormat::IsoSeconds,
    DateFormat::SpaceSeconds,
    DateFormat::DateOnly,
];

const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";
const SPACE_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

// `d` is one ASCII digit; any other byte must match literally.
const DATE_SHAPE: &str = "dddd-dd-dd";
const ISO_SHAPE: &str = "dddd-dd-ddTdd:dd:dd";
const SPACE_SHAPE: &str = "dddd-dd-dd dd:dd:dd";

impl DateFormat {
    /// Parse `text` in exactly this shape.
    pub fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let naive = match self {
            DateFormat::IsoMicros => parse_fractional(text, 6)?,
            DateFormat::IsoMillis => parse_fractional(text, 3)?,
            DateFormat::IsoSeconds => parse_shaped(text, ISO_SHAPE, ISO_SECONDS)?,
            DateFormat::SpaceSeconds => parse_shaped(text, SPACE_SHAPE, SPACE_SECONDS)?,
            DateFormat::DateOnly => {
                if !has_shape(text, DATE_SHAPE) {
                    return None;
                }
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()?
                    .and_hms_opt(0, 0, 0)?
            }
        };
        Some(naive.and_utc())
    }
}

fn has_shape(text: &str, shape: &str) -> bool {
    text.len() == shape.len()
        && text.bytes().zip(shape.bytes()).all(|(t, s)| match s {
            b'd' => t.is_ascii_digit(),
            _ => t == s,
        })
}

/// Leap seconds (`:60`) are rejected.
fn parse_shaped(text: &str, shape: &str, format: &str) -> Option<NaiveDateTime> {
    if !has_shape(text, shape) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(text, format).ok()?;
    (naive.nanosecond() < 1_000_000_000).then_some(naive)
}

/// `<ISO seconds>.<exactly `digits` digits>`
fn parse_fractional(text: &str, digits: usize) -> Option<NaiveDateTime> {
    let (head, fraction) = text.split_once('.')?;
    if fraction.len() != digits || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let base = parse_shaped(head, ISO_SHAPE, ISO_SECONDS)?;
    let value: i64 = fraction.parse().ok()?;
    let offset = match digits {
        3 => Duration::milliseconds(value),
        _ => Duration::microseconds(value),
    };
    base.checked_add_signed(offset)
}

/// Parse `text` with the first matching format.
pub fn try_normalize(text: &str) -> Result<DateTime<Utc>, UnparseableDate> {
    FORMATS
        .iter()
        .find_map(|format| format.parse(text))
        .ok_or_else(|| UnparseableDate(text.to_string()))
}

/// Like `try_normalize`, but an unrecognized timestamp is logged and becomes
/// `None`. Empty input is `None` without a log line.
pub fn normalize(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    match try_normalize(text) {
        Ok(instant) => Some(instant),
        Err(err) => {
            tracing::warn!(input = %text, "{err}");
            None
        }
    }
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
///
/// Use with `#[serde(default, with = "dates::lenient")]`. Decoding never
/// fails: `null`, a non-string value, or an unrecognized string all yield
/// `None`. Encoding writes the microsecond ISO shape.
pub mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => super::normalize(&text),
            Some(other) => super::normalize(&other.to_string()),
        })
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(instant) => {
                serializer.collect_str(&instant.format("%Y-%m-%dT%H:%M:%S%.6f"))
            }
            None => serializer.serialize_none(),
        }
    }
}
