//! Timestamp normalization
//!
//! Honeypot artifacts record wall-clock times of the machine they ran on,
//! usually without a UTC offset. Everything stored or forwarded by Pogo is
//! normalized to UTC and rendered as `YYYY-MM-DD HH:MM:SS`.

use crate::error::{PogoError, Result};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Canonical rendering of a stored timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted layout for naive input values (fractional seconds are optional).
const NAIVE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Accepted layout for input values that carry a numeric UTC offset.
const OFFSET_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%z";

/// A point in time, normalized to UTC with one-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcTimestamp(DateTime<Utc>);

impl UtcTimestamp {
    /// Wrap an existing UTC instant, dropping sub-second precision.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(0))
    }

    /// Parse a value that is already in the canonical UTC form.
    pub fn from_utc_str(value: &str) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), NAIVE_INPUT_FORMAT)
            .map_err(|e| PogoError::invalid_timestamp(value, e.to_string()))?;
        Ok(Self::from_datetime(naive.and_utc()))
    }

    /// Parse a naive wall-clock value and interpret it in `tz`.
    pub fn from_local_str<Tz: TimeZone>(value: &str, tz: &Tz) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), NAIVE_INPUT_FORMAT)
            .map_err(|e| PogoError::invalid_timestamp(value, e.to_string()))?;
        Self::from_local_naive(naive, tz)
    }

    /// Parse a value that may carry its own UTC offset (`20:22:00-0500`).
    ///
    /// Values without an offset fall back to [`UtcTimestamp::from_local_str`].
    pub fn from_zoned_or_local_str<Tz: TimeZone>(value: &str, tz: &Tz) -> Result<Self> {
        match DateTime::parse_from_str(value.trim(), OFFSET_INPUT_FORMAT) {
            Ok(dt) => Ok(Self::from_datetime(dt.with_timezone(&Utc))),
            Err(_) => Self::from_local_str(value, tz),
        }
    }

    /// Resolve a naive wall-clock value against the rules of `tz`.
    ///
    /// Ambiguous values (the repeated hour when clocks go back) resolve to
    /// the earliest instant. Values inside a gap (clocks go forward) are
    /// shifted one hour later.
    pub fn from_local_naive<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> Result<Self> {
        let resolved = match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            // Zones do not agree on the order of the pair
            LocalResult::Ambiguous(a, b) => {
                if a.with_timezone(&Utc) <= b.with_timezone(&Utc) {
                    a
                } else {
                    b
                }
            },
            LocalResult::None => tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .ok_or_else(|| {
                    PogoError::invalid_timestamp(
                        naive.to_string(),
                        "does not exist in the local time zone",
                    )
                })?,
        };
        Ok(Self::from_datetime(resolved.with_timezone(&Utc)))
    }

    /// The underlying UTC instant
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for UtcTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UtcTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_utc_str(&value).map_err(serde::de::Error::custom)
    }
}
