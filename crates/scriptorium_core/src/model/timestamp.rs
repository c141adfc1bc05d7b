//! Canonical timestamp type and boundary normalization.
//!
//! # Responsibility
//! - Define the single time type persisted on every record.
//! - Accept the timestamp shapes callers actually send (RFC 3339 strings,
//!   epoch milliseconds, numeric strings) and normalize them.
//!
//! # Invariants
//! - Persisted timestamps are UTC with millisecond precision, so a record
//!   read back from disk compares equal to the one that was written.
//! - Normalization never fails a request: unreadable input becomes "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use log::warn;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt::Formatter;

/// Canonical persisted time type.
pub type Timestamp = DateTime<Utc>;

/// Returns the current time truncated to persisted precision.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// Builds a timestamp from Unix epoch milliseconds.
pub fn from_epoch_ms(value: i64) -> Option<Timestamp> {
    Utc.timestamp_millis_opt(value).single()
}

/// Parses one serialized timestamp.
///
/// Accepted shapes, in order: RFC 3339, integer epoch milliseconds,
/// `YYYY-MM-DD HH:MM:SS[.fff]` (UTC), `YYYY-MM-DD` (UTC midnight).
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc).trunc_subsecs(3));
    }
    if let Ok(millis) = trimmed.parse::<i64>() {
        return from_epoch_ms(millis);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive).trunc_subsecs(3));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}

/// Parses a serialized timestamp, falling back to [`now`] when unreadable.
pub fn normalize_timestamp(value: &str) -> Timestamp {
    match parse_timestamp(value) {
        Some(parsed) => parsed,
        None => {
            warn!(
                "event=timestamp_normalize module=model status=fallback input_len={}",
                value.len()
            );
            now()
        }
    }
}

/// Serde adapter used by every record timestamp field.
pub mod flexible {
    use super::*;

    pub fn serialize<S>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("an RFC 3339 string or epoch milliseconds")
    }

    fn visit_str<E>(self, value: &str) -> Result<Timestamp, E>
    where
        E: de::Error,
    {
        Ok(normalize_timestamp(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Timestamp, E>
    where
        E: de::Error,
    {
        Ok(from_epoch_ms(value).unwrap_or_else(now))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Timestamp, E>
    where
        E: de::Error,
    {
        Ok(i64::try_from(value)
            .ok()
            .and_then(from_epoch_ms)
            .unwrap_or_else(now))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Timestamp, E>
    where
        E: de::Error,
    {
        if value.is_finite() {
            return Ok(from_epoch_ms(value as i64).unwrap_or_else(now));
        }
        Ok(now())
    }

    fn visit_unit<E>(self) -> Result<Timestamp, E>
    where
        E: de::Error,
    {
        Ok(now())
    }

    fn visit_none<E>(self) -> Result<Timestamp, E>
    where
        E: de::Error,
    {
        Ok(now())
    }
}
