use std::time::Duration;

use thiserror::Error;

/// Driver error types
///
/// `Clone` so that a single connection failure can be handed to every
/// waiter blocked on the connection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// Error message returned by the server for one request
    #[error("Server error: {0}")]
    ServerError(String),

    /// Socket failure or orderly close; terminal for the connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// No outcome arrived within the wait bound of one `get` call
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Malformed or unexpected payload
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    /// Value that cannot be represented on the wire
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DriverError {
    /// Whether this error means the connection is unusable
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DriverError::ConnectionError(_))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::ConnectionError(e.to_string())
    }
}

impl From<bson::ser::Error> for DriverError {
    fn from(e: bson::ser::Error) -> Self {
        DriverError::ProtocolError(format!("Serialization failed: {}", e))
    }
}

impl From<bson::de::Error> for DriverError {
    fn from(e: bson::de::Error) -> Self {
        DriverError::ProtocolError(format!("Deserialization failed: {}", e))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
