//! Numeric coercion of model-extracted parameters
//!
//! Models tend to emit numbers as text (`"1000"`). Before validation, fields
//! declared numeric by the tool's schema are converted when the text parses
//! to a finite number. Anything else is left for validation to reject.

use crate::schema::ParameterSchema;
use serde_json::{Map, Number, Value};
use tracing::warn;

/// Fields coerced when a schema declares no numeric fields or cannot be inspected
pub const FALLBACK_NUMERIC_FIELDS: [&str; 3] = ["initialSupply", "maxSupply", "decimals"];

/// Coerce numeric-looking strings in `params` according to `schema`.
///
/// Non-object input is returned unchanged.
pub fn coerce_numeric_params(params: Value, schema: &ParameterSchema) -> Value {
    let Value::Object(map) = params else {
        return params;
    };

    match schema.numeric_fields() {
        Ok(fields) if !fields.is_empty() => Value::Object(coerce_fields(map, &fields)),
        Ok(_) => Value::Object(coerce_fields(map, &FALLBACK_NUMERIC_FIELDS)),
        Err(e) => {
            warn!("Error analyzing schema for numeric fields: {}", e);
            Value::Object(coerce_fields(map, &FALLBACK_NUMERIC_FIELDS))
        }
    }
}

fn coerce_fields(mut map: Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    for field in fields {
        if let Some(value) = map.get_mut(*field) {
            if let Some(number) = value.as_str().and_then(parse_number) {
                *value = Value::Number(number);
            }
        }
    }
    map
}

/// Parse text as a finite number, preferring an integer representation
fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = text.parse::<u64>() {
        return Some(Number::from(u));
    }

    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < 0.0 {
        return Some(Number::from(f as i64));
    }
    if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 {
        return Some(Number::from(f as u64));
    }
    Number::from_f64(f)
}
