//! Conversion between serde's JSON data model and [`GraphValue`]s.
//!
//! Domain types are read and written through `serde_json::Value`; the
//! declared [`ScalarKind`] decides how each JSON value maps onto a native
//! graph value and back.

use crate::types::ScalarKind;
use crate::value::{GraphDuration, GraphValue, Point};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

fn mismatch(kind: ScalarKind, found: &str) -> String {
    format!("expected {kind:?} but found {found}")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert a serialized field into the graph value for `kind`
pub fn scalar_from_json(kind: ScalarKind, json: &Value) -> Result<GraphValue, String> {
    if json.is_null() {
        return Ok(GraphValue::Null);
    }
    let found = json_kind(json);
    let value = match kind {
        ScalarKind::Bool => GraphValue::Bool(json.as_bool().ok_or_else(|| mismatch(kind, found))?),
        ScalarKind::Int => match json.as_i64() {
            Some(i) => GraphValue::Int(i),
            None if json.is_u64() => {
                return Err(format!("integer {json} does not fit in a signed 64-bit value"))
            }
            None => return Err(mismatch(kind, found)),
        },
        ScalarKind::Float => {
            GraphValue::Float(json.as_f64().ok_or_else(|| mismatch(kind, found))?)
        }
        ScalarKind::String | ScalarKind::Enum => GraphValue::String(
            json.as_str()
                .ok_or_else(|| mismatch(kind, found))?
                .to_string(),
        ),
        ScalarKind::Uuid => {
            let text = json.as_str().ok_or_else(|| mismatch(kind, found))?;
            let parsed = uuid::Uuid::parse_str(text).map_err(|e| e.to_string())?;
            GraphValue::String(parsed.to_string())
        }
        ScalarKind::Date => GraphValue::Date(from_json::<NaiveDate>(json)?),
        ScalarKind::DateTime => {
            let text = json.as_str().ok_or_else(|| mismatch(kind, found))?;
            GraphValue::DateTime(
                DateTime::<FixedOffset>::parse_from_rfc3339(text).map_err(|e| e.to_string())?,
            )
        }
        ScalarKind::LocalDateTime => GraphValue::LocalDateTime(from_json::<NaiveDateTime>(json)?),
        ScalarKind::Time => GraphValue::Time(from_json::<NaiveTime>(json)?),
        ScalarKind::Duration => GraphValue::Duration(from_json::<GraphDuration>(json)?),
        ScalarKind::Point => GraphValue::Point(from_json::<Point>(json)?),
    };
    Ok(value)
}

/// Convert a stored graph value into the JSON serde expects for `kind`
pub fn scalar_to_json(kind: ScalarKind, value: &GraphValue) -> Result<Value, String> {
    let json = match (kind, value) {
        (_, GraphValue::Null) => Value::Null,
        (ScalarKind::Bool, GraphValue::Bool(b)) => Value::Bool(*b),
        (ScalarKind::Int, other) => {
            Value::from(other.as_i64().ok_or_else(|| mismatch(kind, other.type_name()))?)
        }
        (ScalarKind::Float, other) => {
            let f = other.as_f64().ok_or_else(|| mismatch(kind, other.type_name()))?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite float {f} cannot be deserialized"))?
        }
        (ScalarKind::String | ScalarKind::Enum | ScalarKind::Uuid, GraphValue::String(s)) => {
            Value::String(s.clone())
        }
        (ScalarKind::Date, GraphValue::Date(d)) => to_json(d)?,
        (ScalarKind::DateTime, GraphValue::DateTime(dt)) => Value::String(dt.to_rfc3339()),
        (ScalarKind::LocalDateTime, GraphValue::LocalDateTime(dt)) => to_json(dt)?,
        (ScalarKind::Time, GraphValue::Time(t)) => to_json(t)?,
        (ScalarKind::Duration, GraphValue::Duration(d)) => to_json(d)?,
        (ScalarKind::Point, GraphValue::Point(p)) => to_json(p)?,
        // Some engines hand temporal values back as ISO strings.
        (
            ScalarKind::Date | ScalarKind::DateTime | ScalarKind::LocalDateTime | ScalarKind::Time,
            GraphValue::String(s),
        ) => Value::String(s.clone()),
        (_, other) => return Err(mismatch(kind, other.type_name())),
    };
    Ok(json)
}

/// JSON for a value-typed scalar that has no stored value, or `None` when
/// the kind has no sensible default
pub fn scalar_default_json(kind: ScalarKind) -> Option<Value> {
    match kind {
        ScalarKind::Bool => Some(Value::Bool(false)),
        ScalarKind::Int => Some(Value::from(0)),
        ScalarKind::Float => Some(Value::from(0.0)),
        ScalarKind::Date => to_json(&NaiveDate::default()).ok(),
        ScalarKind::DateTime => Some(Value::String("1970-01-01T00:00:00+00:00".to_string())),
        ScalarKind::LocalDateTime => to_json(&NaiveDateTime::default()).ok(),
        ScalarKind::Time => to_json(&NaiveTime::default()).ok(),
        ScalarKind::Duration => to_json(&GraphDuration::default()).ok(),
        ScalarKind::Uuid => Some(Value::String(uuid::Uuid::nil().to_string())),
        ScalarKind::String | ScalarKind::Enum | ScalarKind::Point => None,
    }
}

fn from_json<T: serde::de::DeserializeOwned>(json: &Value) -> Result<T, String> {
    serde_json::from_value(json.clone()).map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}
