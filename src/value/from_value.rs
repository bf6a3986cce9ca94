//! Typed extraction and the fixed coercion table.
//!
//! Coercions follow one rule set, applied both when a record field is read
//! out of a [`Row`](crate::row::Row) and when the mapper normalizes a raw
//! result cell to its column's semantic type:
//!
//! - numeric widening only (`i8 → i16 → i32 → i64`, `f32 → f64`,
//!   integer → decimal); narrowing is always an error
//! - booleans accepted from integer `0`/`1`
//! - temporals parsed from text (RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d`)
//! - no silent defaulting: a failed conversion is an error, never a zero
//! - text is not trimmed unless the column is declared `char_padded`
//!   (CHAR(n) semantics), in which case trailing spaces are stripped

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entity::meta::ColumnType;
use crate::value::Value;

/// Failure to convert a [`Value`] to a requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Name of the type the caller asked for.
    pub expected: &'static str,
    /// Description of the actual value, including its variant name.
    pub actual: String,
}

impl std::fmt::Display for CoercionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot convert {} to {}", self.actual, self.expected)
    }
}

impl std::error::Error for CoercionError {}

fn mismatch(expected: &'static str, value: &Value) -> CoercionError {
    CoercionError {
        expected,
        actual: format!("{} value {:?}", value.type_name(), value),
    }
}

/// Typed extraction from a [`Value`], applying the coercion table.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CoercionError>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => match other.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(mismatch("bool", value)),
            },
        }
    }
}

impl FromValue for i8 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::TinyInt(v) => Ok(*v),
            _ => Err(mismatch("i8", value)),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::TinyInt(v) => Ok(i16::from(*v)),
            Value::SmallInt(v) => Ok(*v),
            _ => Err(mismatch("i16", value)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::TinyInt(v) => Ok(i32::from(*v)),
            Value::SmallInt(v) => Ok(i32::from(*v)),
            Value::Int(v) => Ok(*v),
            _ => Err(mismatch("i32", value)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Float(v) => Ok(*v),
            _ => Err(mismatch("f32", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            _ => Err(mismatch("f64", value)),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Decimal(v) => Ok(*v),
            other => other
                .as_i64()
                .map(Decimal::from)
                .ok_or_else(|| mismatch("decimal", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(mismatch("text", value)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            _ => Err(mismatch("bytes", value)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| mismatch("date", value)),
            _ => Err(mismatch("date", value)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
                .map_err(|_| mismatch("time", value)),
            _ => Err(mismatch("time", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| mismatch("datetime", value)),
            Value::Text(s) => parse_naive_datetime(s.trim()).ok_or_else(|| mismatch("datetime", value)),
            _ => Err(mismatch("datetime", value)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::TimestampTz(dt) => Ok(*dt),
            Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| mismatch("timestamptz", value)),
            _ => Err(mismatch("timestamptz", value)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s.trim()).map_err(|_| mismatch("uuid", value)),
            _ => Err(mismatch("uuid", value)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|_| mismatch("json", value)),
            _ => Err(mismatch("json", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Normalize a raw result cell to the canonical variant for a column's
/// semantic type.
///
/// The mapper calls this for every bound column before handing the row to
/// the record's `load`. Widening follows the coercion table; anything else
/// is an error that the mapper wraps with the offending column name.
pub fn coerce_to_column_type(
    value: &Value,
    ty: ColumnType,
    char_padded: bool,
) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        ColumnType::Boolean => bool::from_value(value).map(Value::Bool),
        ColumnType::Integer => i32::from_value(value).map(Value::Int),
        ColumnType::BigInt => i64::from_value(value).map(Value::BigInt),
        ColumnType::Decimal => Decimal::from_value(value).map(Value::Decimal),
        ColumnType::Float => f32::from_value(value).map(Value::Float),
        ColumnType::Double => f64::from_value(value).map(Value::Double),
        ColumnType::Text => {
            let s = String::from_value(value)?;
            if char_padded {
                Ok(Value::Text(s.trim_end_matches(' ').to_string()))
            } else {
                Ok(Value::Text(s))
            }
        }
        ColumnType::Bytes => Vec::<u8>::from_value(value).map(Value::Bytes),
        ColumnType::Date => NaiveDate::from_value(value).map(Value::Date),
        ColumnType::Time => NaiveTime::from_value(value).map(Value::Time),
        ColumnType::DateTime => NaiveDateTime::from_value(value).map(Value::DateTime),
        ColumnType::TimestampTz => DateTime::<Utc>::from_value(value).map(Value::TimestampTz),
        ColumnType::Uuid => Uuid::from_value(value).map(Value::Uuid),
        ColumnType::Json => serde_json::Value::from_value(value).map(Value::Json),
    }
}
