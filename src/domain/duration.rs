//! TTL parsing and serialization helpers.
//!
//! TTLs travel as whole seconds on the wire. Parameters accept either a JSON
//! integer (`90`) or a string with an optional unit suffix (`"90s"`, `"5m"`,
//! `"2h"`, `"1d"`).

use std::time::Duration;

use chrono::TimeDelta;
use serde_json::Value;

use crate::errors::{BackendError, BackendResult};

/// Serde adapter serializing a [`Duration`] as whole seconds
pub mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Parse a TTL parameter value
pub fn parse_ttl(field: &str, value: &Value) -> BackendResult<Duration> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| BackendError::invalid_parameter(field, "must be a non-negative integer")),
        Value::String(s) => parse_ttl_str(s)
            .ok_or_else(|| BackendError::invalid_parameter(field, format!("invalid duration '{}'", s))),
        _ => Err(BackendError::invalid_parameter(field, "must be an integer or duration string")),
    }
}

fn parse_ttl_str(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    amount.checked_mul(multiplier).map(Duration::from_secs)
}

/// Convert to a chrono delta for timestamp arithmetic
pub fn to_delta(value: Duration) -> BackendResult<TimeDelta> {
    TimeDelta::from_std(value)
        .map_err(|_| BackendError::invalid_ttl(format!("{}s is out of range", value.as_secs())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ttl_numbers_and_suffixes() {
        assert_eq!(parse_ttl("ttl", &json!(90)).unwrap(), Duration::from_secs(90));
        assert_eq!(parse_ttl("ttl", &json!("90")).unwrap(), Duration::from_secs(90));
        assert_eq!(parse_ttl("ttl", &json!("90s")).unwrap(), Duration::from_secs(90));
        assert_eq!(parse_ttl("ttl", &json!("5m")).unwrap(), Duration::from_secs(300));
        assert_eq!(parse_ttl("ttl", &json!("2h")).unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_ttl("ttl", &json!("1d")).unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_ttl_rejects_garbage() {
        assert!(parse_ttl("ttl", &json!(-5)).is_err());
        assert!(parse_ttl("ttl", &json!("ten")).is_err());
        assert!(parse_ttl("ttl", &json!("10w")).is_err());
        assert!(parse_ttl("ttl", &json!(true)).is_err());

        let err = parse_ttl("max_ttl", &json!(1.5)).unwrap_err();
        assert!(matches!(err, BackendError::InvalidParameter { ref field, .. } if field == "max_ttl"));
    }
}
