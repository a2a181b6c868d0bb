//! Serde helpers for durations.
//!
//! Accepts integer milliseconds (`30000`) or humantime strings (`"30s"`,
//! `"250ms"`). Always serializes as integer milliseconds.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::time::Duration;

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("milliseconds as an integer or a duration string such as \"30s\"")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(Duration::from_millis(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value)
            .map(Duration::from_millis)
            .map_err(|_| E::custom(format!("duration cannot be negative: {value}")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if value.is_finite() && value >= 0.0 {
            Ok(Duration::from_millis(value as u64))
        } else {
            Err(E::custom(format!("invalid duration: {value}")))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        parse(value).map_err(E::custom)
    }
}

/// Parse a duration from milliseconds or a humantime string.
///
/// # Errors
/// Returns a message if the value is neither.
pub fn parse(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if let Ok(ms) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(trimmed).map_err(|e| format!("invalid duration '{trimmed}': {e}"))
}

/// Serialize as integer milliseconds.
pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Deserialize from milliseconds or a humantime string.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    deserializer.deserialize_any(DurationVisitor)
}

/// Same as the parent module, for `Option<Duration>`.
pub mod option {
    use super::DurationVisitor;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    struct Wrapper(Duration);

    impl<'de> Deserialize<'de> for Wrapper {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(DurationVisitor).map(Wrapper)
        }
    }

    /// Serialize as integer milliseconds or null.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_u64(d.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|w| w.0))
    }
}
