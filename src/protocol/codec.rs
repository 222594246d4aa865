use bson::Document;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::command::Command;
use super::error::{DriverError, DriverResult};
use super::response::Response;
use super::types::Ticker;

pub const HEADER_LEN: usize = 4;
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Payload of a server keep-alive ping
pub const HEARTBEAT: u8 = b'H';

/// Reply to a heartbeat: a frame with length zero
pub const EMPTY_FRAME: [u8; HEADER_LEN] = [0; HEADER_LEN];

/// One unit read off the stream: `[length: 4 bytes LE][payload]`
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `length == 0`, no payload
    Empty,
    /// `length == 1`, payload `H`
    Heartbeat,
    Payload(Vec<u8>),
}

/// Frame a BSON document, refusing payloads over `limit`
pub fn encode_document(doc: &Document, limit: usize) -> DriverResult<Vec<u8>> {
    let mut buf = vec![0u8; HEADER_LEN];
    doc.to_writer(&mut buf)?;

    let len = buf.len() - HEADER_LEN;
    if len > limit {
        return Err(DriverError::MessageTooLarge(len));
    }
    let len = u32::try_from(len).map_err(|_| DriverError::MessageTooLarge(len))?;
    buf[..HEADER_LEN].copy_from_slice(&len.to_le_bytes());
    Ok(buf)
}

pub fn encode_command(ticker: Ticker, cmd: &Command) -> DriverResult<Vec<u8>> {
    encode_command_with_limit(ticker, cmd, MAX_MESSAGE_SIZE)
}

pub fn encode_command_with_limit(
    ticker: Ticker,
    cmd: &Command,
    limit: usize,
) -> DriverResult<Vec<u8>> {
    encode_document(&cmd.to_document(ticker)?, limit)
}

pub fn encode_response(resp: &Response) -> DriverResult<Vec<u8>> {
    encode_document(&resp.to_document()?, MAX_MESSAGE_SIZE)
}

pub fn decode_document(payload: &[u8]) -> DriverResult<Document> {
    Ok(bson::from_slice(payload)?)
}

pub fn decode_response(payload: &[u8]) -> DriverResult<Response> {
    Response::from_document(decode_document(payload)?)
}

pub fn decode_request(payload: &[u8]) -> DriverResult<(Ticker, Command)> {
    Command::from_document(decode_document(payload)?)
}

/// Read the next frame.
///
/// Any I/O failure, including EOF, is a `ConnectionError`; the stream cannot
/// be resynchronised after a partial read.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> DriverResult<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| read_error("length", e))?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 {
        return Ok(Frame::Empty);
    }
    if len > limit {
        return Err(DriverError::MessageTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| read_error("payload", e))?;

    if len == 1 && payload[0] == HEARTBEAT {
        return Ok(Frame::Heartbeat);
    }
    Ok(Frame::Payload(payload))
}

fn read_error(what: &str, e: std::io::Error) -> DriverError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        DriverError::ConnectionError("Connection closed by peer".to_string())
    } else {
        DriverError::ConnectionError(format!("Read {} failed: {}", what, e))
    }
}
