//! Forgiving deserializers for numeric fields coming from generated JSON.
//!
//! Upstream models emit amounts as integers, floats, numeric strings or
//! `null` more or less at random. All of these are accepted; anything that
//! cannot be read as a number becomes zero (unset).

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::PurchaseUnit;

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
                trimmed.replace(',', ".")
            } else {
                trimmed.replace(',', "")
            };
            normalized.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Deserialize a currency amount or rate. Unreadable values become `0.0`.
pub fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0))
}

/// Deserialize a non-negative count, rounding fractional values.
pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    Ok(number_from_value(&value)
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0))
}

/// Deserialize an optional purchase unit; unknown spellings become `None`.
pub fn purchase_unit<'de, D>(deserializer: D) -> Result<Option<PurchaseUnit>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(|s| s.parse().ok()))
}

/// Deserialize a string that may be `null`.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
