//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only point in time truncated to seconds
//! precision. Every lifecycle stamp, SLA deadline, movement record and audit
//! entry uses this type.
//!
//! Non-UTC inputs are **rejected at construction** by [`Timestamp::parse`];
//! [`Timestamp::parse_lenient`] exists for ingesting external data and
//! normalises any offset to UTC.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A UTC-only timestamp, truncated to seconds.
///
/// # Construction
///
/// - [`Timestamp::now()`]: current UTC time, truncated.
/// - [`Timestamp::from_utc()`]: from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`]: from an ISO8601 string, rejecting non-UTC offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    ///
    /// Engine code reads time through [`crate::Clock`]; this is what
    /// [`crate::SystemClock`] returns.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string that must carry the `Z` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the string is not valid
    /// RFC 3339 or uses an explicit offset (even `+00:00`).
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        if !s.ends_with('Z') {
            return Err(EngineError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, EngineError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            EngineError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, EngineError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| EngineError::Validation(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward by `minutes` (negative shifts backward).
    ///
    /// Panics if the result is outside chrono's range; use
    /// [`Timestamp::checked_plus_minutes`] for untrusted offsets.
    pub fn plus_minutes(&self, minutes: i64) -> Self {
        Self(self.0 + Duration::minutes(minutes))
    }

    /// Like [`Timestamp::plus_minutes`], but `None` when the offset or the
    /// result is out of range.
    pub fn checked_plus_minutes(&self, minutes: i64) -> Option<Self> {
        Duration::try_minutes(minutes)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
    }

    /// This instant shifted forward by a `chrono::Duration`, truncated to seconds.
    pub fn plus(&self, duration: Duration) -> Self {
        Self(truncate_to_seconds(self.0 + duration))
    }

    /// Whole minutes elapsed from `earlier` to `self`, floored.
    ///
    /// Negative spans floor toward negative infinity, so 30 seconds before
    /// `earlier` is `-1`.
    pub fn whole_minutes_since(&self, earlier: &Timestamp) -> i64 {
        (self.0 - earlier.0).num_seconds().div_euclid(60)
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Discard nanoseconds.
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_now_has_no_subseconds() {
        let t = Timestamp::now();
        assert_eq!(t.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let t = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(t.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn test_parse_rejects_offsets() {
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T17:00:00+05:00").is_err());
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let t = Timestamp::parse_lenient("2026-01-15T14:00:00+02:00").unwrap();
        assert_eq!(t.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_checked_plus_minutes() {
        let t0 = Timestamp::parse("2026-03-01T08:00:00Z").unwrap();
        assert_eq!(t0.checked_plus_minutes(30), Some(t0.plus_minutes(30)));
        assert_eq!(t0.checked_plus_minutes(9_000_000_000_000_000_000), None);
        assert_eq!(t0.checked_plus_minutes(i64::MIN), None);
        // In range for the offset, out of range for the calendar.
        assert_eq!(t0.checked_plus_minutes(1_000_000_000_000), None);
    }

    #[test]
    fn test_plus_minutes() {
        let t0 = ts("2026-03-01T08:00:00Z");
        assert_eq!(t0.plus_minutes(30).to_iso8601(), "2026-03-01T08:30:00Z");
        assert_eq!(t0.plus_minutes(240).to_iso8601(), "2026-03-01T12:00:00Z");
        assert_eq!(t0.plus_minutes(-60).to_iso8601(), "2026-03-01T07:00:00Z");
    }

    #[test]
    fn test_whole_minutes_since_floors() {
        let t0 = ts("2026-03-01T08:00:00Z");
        assert_eq!(ts("2026-03-01T08:00:59Z").whole_minutes_since(&t0), 0);
        assert_eq!(ts("2026-03-01T08:01:00Z").whole_minutes_since(&t0), 1);
        assert_eq!(ts("2026-03-01T09:29:59Z").whole_minutes_since(&t0), 89);
        assert_eq!(ts("2026-03-01T07:59:30Z").whole_minutes_since(&t0), -1);
    }

    #[test]
    fn test_epoch_roundtrip() {
        let t = ts("2026-01-15T12:00:00Z");
        assert_eq!(Timestamp::from_epoch_secs(t.epoch_secs()).unwrap(), t);
    }

    #[test]
    fn test_ordering_and_display() {
        let a = ts("2026-01-15T12:00:00Z");
        let b = ts("2026-01-15T12:00:01Z");
        assert!(a < b);
        assert_eq!(format!("{a}"), "2026-01-15T12:00:00Z");
    }
}
