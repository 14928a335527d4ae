//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, the type behind an asset's `meta.created` and
//! `meta.modified` fields.
//!
//! ## Invariant
//!
//! Timestamps are UTC, rendered as ISO-8601 with a `Z` suffix and exactly
//! three fractional digits (`2026-01-15T12:00:00.000Z`). Rename and replace
//! compare `modified` values for optimistic concurrency, so two renderings of
//! the same instant must be byte-identical. Sub-millisecond precision is
//! discarded at construction.
//!
//! Documents written by other tools may carry offsets or no fractional part;
//! [`Timestamp::parse()`] accepts any RFC 3339 input and normalizes it.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AhubError;

/// A UTC timestamp truncated to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `chrono::DateTime<Utc>`, truncating below milliseconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse an RFC 3339 / ISO-8601 string, converting any offset to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`AhubError::Corrupt`] if the string is not valid RFC 3339.
    pub fn parse(s: &str) -> Result<Self, AhubError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| AhubError::Corrupt(format!("invalid timestamp {s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO-8601 with milliseconds and a `Z` suffix.
    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl std::str::FromStr for Timestamp {
    type Err = AhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}
