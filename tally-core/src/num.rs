//! Numeric helpers shared by the tabular and pipeline engines
//!
//! Computed numbers collapse back to integers when they are whole so that
//! counts stay counts after passing through floating-point arithmetic.

use serde_json::Value;

/// Strict numeric view of a JSON value. No string coercion.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Largest integer magnitude exactly representable in an f64.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Convert a computed float back into a JSON number, preferring integers.
pub fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_INT {
        Value::Number(serde_json::Number::from(value as i64))
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Round to a fixed number of decimal places (half away from zero).
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
