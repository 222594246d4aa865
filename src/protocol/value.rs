//! Scalar values and their BSON representation
//!
//! Scalars map onto the native BSON types. Timestamps travel as a two-element
//! array `[epoch_seconds, nanos]` with `nanos` in `[0, 1e9)`.

use bson::Bson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};
use super::types::{ResultSet, Row};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A single cell or argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer value, if this is an integer that fits in `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::UInt32(u) => Some(i64::from(*u)),
            Value::Int64(i) => Some(*i),
            Value::UInt64(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(f) => Some(f64::from(*f)),
            Value::Float64(f) => Some(*f),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Marshal into the wire form
    pub fn to_bson(&self) -> DriverResult<Bson> {
        Ok(match self {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Int32(i) => Bson::Int32(*i),
            Value::UInt32(u) => int_to_bson(i64::from(*u)),
            Value::Int64(i) => int_to_bson(*i),
            Value::UInt64(u) => {
                let v = i64::try_from(*u).map_err(|_| {
                    DriverError::InvalidArgument(format!(
                        "{} does not fit in a signed 64-bit integer",
                        u
                    ))
                })?;
                int_to_bson(v)
            }
            Value::Float32(f) => Bson::Double(f64::from(*f)),
            Value::Float64(f) => Bson::Double(*f),
            Value::String(s) => Bson::String(s.clone()),
            Value::Timestamp(ts) => timestamp_to_bson(ts),
        })
    }

    /// Unmarshal one result cell.
    ///
    /// A two-element array is a timestamp pair; unrecognized types become
    /// `Null`.
    pub fn from_bson(bson: Bson) -> DriverResult<Value> {
        match bson {
            Bson::Null => Ok(Value::Null),
            Bson::Boolean(b) => Ok(Value::Bool(b)),
            Bson::Int32(i) => Ok(Value::Int32(i)),
            Bson::Int64(i) => Ok(Value::Int64(i)),
            Bson::Double(d) => Ok(Value::Float64(d)),
            Bson::String(s) => Ok(Value::String(s)),
            Bson::Array(pair) if pair.len() == 2 => timestamp_from_pair(&pair).map(Value::Timestamp),
            Bson::DateTime(dt) => DateTime::from_timestamp_millis(dt.timestamp_millis())
                .map(Value::Timestamp)
                .ok_or_else(|| DriverError::ProtocolError(format!("Datetime out of range: {}", dt))),
            _ => Ok(Value::Null),
        }
    }
}

/// Integers go out as int32 when they fit
pub fn int_to_bson(v: i64) -> Bson {
    match i32::try_from(v) {
        Ok(i) => Bson::Int32(i),
        Err(_) => Bson::Int64(v),
    }
}

pub(crate) fn bson_as_i64(bson: &Bson) -> Option<i64> {
    match bson {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Split an instant into whole epoch seconds and a nanosecond remainder in `[0, 1e9)`
pub fn timestamp_parts(ts: &DateTime<Utc>) -> (i64, i64) {
    let secs = ts.timestamp();
    // leap seconds report up to 2e9 - 1 subsecond nanos
    let nanos = i64::from(ts.timestamp_subsec_nanos());
    (secs + nanos / NANOS_PER_SEC, nanos % NANOS_PER_SEC)
}

/// Inverse of [`timestamp_parts`]: `epoch + secs + nanos`
pub fn timestamp_from_parts(secs: i64, nanos: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)?.checked_add_signed(chrono::Duration::nanoseconds(nanos))
}

fn timestamp_to_bson(ts: &DateTime<Utc>) -> Bson {
    let (secs, nanos) = timestamp_parts(ts);
    Bson::Array(vec![int_to_bson(secs), int_to_bson(nanos)])
}

/// Timestamp part; whole doubles are accepted and truncated toward zero
fn timestamp_part(bson: &Bson) -> Option<i64> {
    match bson {
        Bson::Double(d) if d.is_finite() && d.abs() < i64::MAX as f64 => Some(d.trunc() as i64),
        other => bson_as_i64(other),
    }
}

fn timestamp_from_pair(pair: &[Bson]) -> DriverResult<DateTime<Utc>> {
    let (secs, nanos) = match (timestamp_part(&pair[0]), timestamp_part(&pair[1])) {
        (Some(secs), Some(nanos)) => (secs, nanos),
        _ => {
            return Err(DriverError::ProtocolError(
                "Timestamp pair must hold two numbers".to_string(),
            ))
        }
    };
    timestamp_from_parts(secs, nanos).ok_or_else(|| {
        DriverError::ProtocolError(format!("Timestamp out of range: [{}, {}]", secs, nanos))
    })
}

/// Marshal one argument list
pub fn encode_args(args: &[Value]) -> DriverResult<Vec<Bson>> {
    args.iter().map(Value::to_bson).collect()
}

/// Marshal a batch of argument lists into a matrix
pub fn encode_rows(rows: &[Row]) -> DriverResult<Vec<Bson>> {
    rows.iter()
        .map(|row| encode_args(row).map(Bson::Array))
        .collect()
}

/// Unmarshal a result matrix row by row, column by column
pub fn decode_rows(matrix: Vec<Bson>) -> DriverResult<ResultSet> {
    let mut rows = Vec::with_capacity(matrix.len());
    for (i, row) in matrix.into_iter().enumerate() {
        let cells = match row {
            Bson::Array(cells) => cells,
            other => {
                return Err(DriverError::ProtocolError(format!(
                    "Row {} is not an array: {:?}",
                    i,
                    other.element_type()
                )))
            }
        };
        let row = cells
            .into_iter()
            .map(Value::from_bson)
            .collect::<DriverResult<Row>>()?;
        rows.push(row);
    }
    Ok(ResultSet::new(rows))
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    DateTime<Utc> => Timestamp,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
