use bson::{doc, Bson, Document};

use super::error::{DriverError, DriverResult};
use super::types::{ResultSet, Ticker};
use super::value::{bson_as_i64, decode_rows, encode_rows, int_to_bson, Value};

/// Successful outcome of one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Result matrix
    Rows(ResultSet),
    /// Single value, e.g. a prepared statement id or an acknowledgement
    Scalar(Value),
}

impl Outcome {
    /// Rows of this outcome; a scalar yields an empty set
    pub fn into_result_set(self) -> ResultSet {
        match self {
            Outcome::Rows(rows) => rows,
            Outcome::Scalar(_) => ResultSet::default(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Outcome::Scalar(v) => Some(v),
            Outcome::Rows(_) => None,
        }
    }
}

/// Response frame: `"0"` ticker, `"1"` outcome.
///
/// A string outcome is a server error message.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub ticker: Ticker,
    pub result: Result<Outcome, DriverError>,
}

impl Response {
    pub fn rows(ticker: Ticker, rows: ResultSet) -> Self {
        Self {
            ticker,
            result: Ok(Outcome::Rows(rows)),
        }
    }

    pub fn scalar(ticker: Ticker, value: Value) -> Self {
        Self {
            ticker,
            result: Ok(Outcome::Scalar(value)),
        }
    }

    pub fn error(ticker: Ticker, message: impl Into<String>) -> Self {
        Self {
            ticker,
            result: Err(DriverError::ServerError(message.into())),
        }
    }

    pub fn to_document(&self) -> DriverResult<Document> {
        let outcome = match &self.result {
            Ok(Outcome::Rows(rows)) => Bson::Array(encode_rows(rows.rows())?),
            Ok(Outcome::Scalar(value)) => value.to_bson()?,
            Err(DriverError::ServerError(msg)) => Bson::String(msg.clone()),
            Err(other) => Bson::String(other.to_string()),
        };
        Ok(doc! { "0": int_to_bson(self.ticker), "1": outcome })
    }

    /// Decode a response document.
    ///
    /// Fails only when the ticker is unreadable. An outcome that cannot be
    /// decoded is kept as a `ProtocolError` for that ticker.
    pub fn from_document(mut doc: Document) -> DriverResult<Response> {
        let ticker = doc.get("0").and_then(bson_as_i64).ok_or_else(|| {
            DriverError::ProtocolError("Response has no integer ticker".to_string())
        })?;
        let result = match doc.remove("1").unwrap_or(Bson::Null) {
            Bson::String(msg) => Err(DriverError::ServerError(msg)),
            Bson::Array(matrix) => decode_rows(matrix).map(Outcome::Rows),
            other => Value::from_bson(other).map(Outcome::Scalar),
        };
        Ok(Response { ticker, result })
    }
}
