// crates/hardstop-core/src/core/time.rs
// ============================================================================
// Module: Hardstop Time Model
// Description: Whole-second UTC timestamps with an ISO 8601 `Z` wire form.
// Purpose: Keep every stored instant lexicographically and chronologically ordered.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Hardstop stores every instant as a whole-second UTC timestamp whose wire
//! form is `YYYY-MM-DDTHH:MM:SSZ`. Fixed width plus a trailing `Z` means
//! lexicographic order on the stored string matches chronological order,
//! which the correlation window scan and the brief sort rely on.
//!
//! The core never reads the wall clock. Hosts pass `now` into operators;
//! pinned runs pass the pinned instant instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::Date;
use time::Duration;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::Time;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire format for timestamps: fixed-width UTC with a trailing `Z`.
const WIRE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Format accepted for date-only inputs (interpreted as end-of-day UTC).
const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Compact date format used inside derived identifiers.
const COMPACT_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parsing errors.
///
/// # Invariants
/// - Messages never embed more than the offending input text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    /// Input did not match any accepted timestamp or date form.
    #[error("unparseable timestamp: {0}")]
    Unparseable(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Whole-second UTC instant with a stable ISO 8601 `Z` wire form.
///
/// # Invariants
/// - Always UTC; construction normalizes offsets and drops sub-second parts.
/// - Lexicographic order of the serialized form matches chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcTimestamp(OffsetDateTime);

impl UtcTimestamp {
    /// Unix epoch (1970-01-01T00:00:00Z), used as the live-mode scrub sentinel.
    pub const EPOCH: Self = Self(OffsetDateTime::UNIX_EPOCH);

    /// Creates a timestamp from unix seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] when the value is outside the representable range.
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, TimeParseError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| TimeParseError::Unparseable(format!("unix:{seconds}")))
    }

    /// Returns the timestamp as unix seconds.
    #[must_use]
    pub const fn unix_seconds(self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Parses an RFC 3339 timestamp, normalizing any offset to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] when the input is not a valid RFC 3339 instant.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339)
            .map_err(|_| TimeParseError::Unparseable(input.to_string()))?;
        Ok(Self::normalize(parsed))
    }

    /// Parses a date-only value (`YYYY-MM-DD`) as end-of-day UTC (23:59:59).
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] when the input is not a calendar date.
    pub fn parse_date_end_of_day(input: &str) -> Result<Self, TimeParseError> {
        let date = Date::parse(input, DATE_FORMAT)
            .map_err(|_| TimeParseError::Unparseable(input.to_string()))?;
        let end_of_day = Time::from_hms(23, 59, 59)
            .map_err(|_| TimeParseError::Unparseable(input.to_string()))?;
        let instant = PrimitiveDateTime::new(date, end_of_day).assume_utc();
        Ok(Self::normalize(instant))
    }

    /// Parses either an RFC 3339 instant or a date-only value.
    ///
    /// Date-only values become end-of-day UTC; timestamps with an offset are
    /// converted to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError`] when neither form matches.
    pub fn parse_lenient(input: &str) -> Result<Self, TimeParseError> {
        Self::parse(input).or_else(|_| Self::parse_date_end_of_day(input))
    }

    /// Renders the canonical wire form (`YYYY-MM-DDTHH:MM:SSZ`).
    #[must_use]
    pub fn render(self) -> String {
        self.0
            .format(WIRE_FORMAT)
            .unwrap_or_else(|_| String::from("0000-00-00T00:00:00Z"))
    }

    /// Renders the compact date component (`YYYYMMDD`) for derived identifiers.
    #[must_use]
    pub fn render_compact_date(self) -> String {
        self.0.format(COMPACT_DATE_FORMAT).unwrap_or_else(|_| String::from("00000000"))
    }

    /// Returns the timestamp advanced by whole hours (saturating).
    #[must_use]
    pub fn plus_hours(self, hours: i64) -> Self {
        Self::normalize(self.0.saturating_add(Duration::hours(hours)))
    }

    /// Returns the timestamp advanced by whole days (saturating).
    #[must_use]
    pub fn plus_days(self, days: i64) -> Self {
        Self::normalize(self.0.saturating_add(Duration::days(days)))
    }

    /// Returns the timestamp moved back by whole hours (saturating).
    #[must_use]
    pub fn minus_hours(self, hours: i64) -> Self {
        Self::normalize(self.0.saturating_sub(Duration::hours(hours)))
    }

    /// Returns the timestamp moved back by whole days (saturating).
    #[must_use]
    pub fn minus_days(self, days: i64) -> Self {
        Self::normalize(self.0.saturating_sub(Duration::days(days)))
    }

    /// Returns signed whole hours from `earlier` to `self` (truncated).
    #[must_use]
    pub const fn hours_since(self, earlier: Self) -> i64 {
        (self.0.unix_timestamp() - earlier.0.unix_timestamp()) / 3_600
    }

    /// Returns absolute whole hours between two instants (truncated).
    #[must_use]
    pub const fn hours_between(self, other: Self) -> i64 {
        let delta = self.0.unix_timestamp() - other.0.unix_timestamp();
        delta.abs() / 3_600
    }

    /// Normalizes an instant to UTC whole seconds.
    fn normalize(value: OffsetDateTime) -> Self {
        let utc = value.to_offset(time::UtcOffset::UTC);
        Self(utc.replace_nanosecond(0).unwrap_or(utc))
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for UtcTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for UtcTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
