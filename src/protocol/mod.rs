//! Wire protocol definitions for the native client
//!
//! Every message is a frame `[length: 4 bytes LE][BSON payload]`. A frame of
//! length zero is a no-op; a one-byte frame holding `H` is a server heartbeat
//! and is answered with a zero-length frame.

pub mod codec;
pub mod command;
pub mod error;
pub mod response;
pub mod types;
pub mod value;

pub use codec::{
    decode_request, decode_response, encode_command, encode_response, read_frame, Frame,
    EMPTY_FRAME, HEARTBEAT, MAX_MESSAGE_SIZE,
};
pub use command::{Command, Statement};
pub use error::{DriverError, DriverResult};
pub use response::{Outcome, Response};
pub use types::{ResultSet, Row, Ticker};
pub use value::Value;
