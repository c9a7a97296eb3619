//! Canonical timestamp handling.
//!
//! Every timestamp entering the crate is normalized to UTC epoch
//! milliseconds. Callers may hand in a `DateTime`, a raw epoch value or an
//! ISO-8601 string. Serialized form is RFC 3339 with milliseconds for years
//! 0000 through 9999 and a plain epoch-millis number outside that range.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A point in time, stored as UTC epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Convert to a `DateTime<Utc>`, clamping values chrono cannot represent.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// RFC 3339 rendering with millisecond precision.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        self.to_datetime()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// RFC 3339 text that [`Timestamp::parse_iso`] reads back to the same
    /// value, or `None` for years outside 0000-9999.
    fn rfc3339_lossless(self) -> Option<String> {
        let datetime = Utc.timestamp_millis_opt(self.0).single()?;
        (0..=9999)
            .contains(&datetime.year())
            .then(|| datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Parse an ISO-8601 string.
    ///
    /// Accepts full RFC 3339 values, offset-less date-times (read as UTC)
    /// and bare dates (midnight UTC).
    pub fn parse_iso(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self(parsed.timestamp_millis()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(Self(naive.and_utc().timestamp_millis()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(midnight.and_utc().timestamp_millis()));
            }
        }
        Err(Error::InvalidInput(format!("invalid timestamp: {value}")))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(millis) = s.trim().parse::<i64>() {
            return Ok(Self(millis));
        }
        Self::parse_iso(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_millis())
    }
}

/// Any of the timestamp shapes accepted at the gateway boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampInput {
    DateTime(DateTime<Utc>),
    EpochMillis(i64),
    Iso(String),
}

impl TimestampInput {
    pub fn normalize(self) -> Result<Timestamp> {
        match self {
            Self::DateTime(value) => Ok(value.into()),
            Self::EpochMillis(millis) => Ok(Timestamp::from_millis(millis)),
            Self::Iso(value) => Timestamp::parse_iso(&value),
        }
    }
}

impl TryFrom<TimestampInput> for Timestamp {
    type Error = Error;

    fn try_from(value: TimestampInput) -> Result<Self> {
        value.normalize()
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.rfc3339_lossless() {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_i64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl Visitor<'_> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("epoch milliseconds or an ISO-8601 string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Timestamp, E> {
        Ok(Timestamp::from_millis(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Timestamp, E> {
        i64::try_from(value)
            .map(Timestamp::from_millis)
            .map_err(|_| E::custom("timestamp out of range"))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Timestamp, E> {
        if value.is_finite() {
            Ok(Timestamp::from_millis(value.round() as i64))
        } else {
            Err(E::custom("timestamp must be finite"))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Timestamp, E> {
        Timestamp::parse_iso(value).map_err(E::custom)
    }
}
