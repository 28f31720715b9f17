//! Page timestamps.
//!
//! Every record written from one page carries the same timestamp, taken
//! as UK civil time (`Europe/London`) with its UTC offset, e.g.
//! `2024-06-05 15:51:58.084937+01:00`. The host's `TZ` plays no part.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Europe::London;
use regex::Regex;

/// `chrono` format for page timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{6}[+-][0-9]{2}:[0-9]{2}$")
        .expect("valid regex")
});

/// A timestamp did not have the `YYYY-MM-DD HH:MM:SS.ffffff±HH:MM` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timestamp '{value}' is not valid, expected YYYY-MM-DD HH:MM:SS.ffffff+HH:MM")]
pub struct TimestampError {
    /// The rejected value.
    pub value: String,
}

/// A validated page timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp(String);

impl Timestamp {
    /// Takes the current time in `Europe/London`.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] if the formatted value fails validation.
    pub fn now() -> Result<Self, TimestampError> {
        Self::from_datetime(&Utc::now().with_timezone(&London))
    }

    /// Formats and validates an arbitrary zoned date time.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] if the formatted value fails validation.
    pub fn from_datetime<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Result<Self, TimestampError>
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::parse(datetime.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Validates an already formatted timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] unless the value matches the exact pattern
    /// and names a real date and time.
    pub fn parse(value: impl Into<String>) -> Result<Self, TimestampError> {
        let value = value.into();
        if TIMESTAMP_RE.is_match(&value) && DateTime::parse_from_str(&value, TIMESTAMP_FORMAT).is_ok()
        {
            Ok(Self(value))
        } else {
            Err(TimestampError { value })
        }
    }

    /// The formatted value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Timestamp> for serde_json::Value {
    fn from(timestamp: Timestamp) -> Self {
        Self::String(timestamp.0)
    }
}
