//! Per-connection reactor
//!
//! One thread runs a current-thread runtime that owns the socket. The read
//! half dispatches responses into the pending table; the write half drains the
//! outbox. Callers on other threads only ever touch the outbox and the table.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};
use tokio::sync::{oneshot, Notify};

use super::builder::ConnectionConfig;
use super::pending::PendingTable;
use crate::protocol::{decode_response, read_frame, DriverError, DriverResult, Frame, EMPTY_FRAME};

const THREAD_NAME: &str = "opentick-reactor";

/// Start the reactor thread and block until the socket is connected.
///
/// The outbox carries encoded frames, header included. `pong` must not keep
/// it alive: when every `Connection` handle is dropped the writer sees the
/// channel close and shuts down. `close` drops the socket immediately.
pub(crate) fn spawn(
    config: &ConnectionConfig,
    table: Arc<PendingTable>,
    close: Arc<Notify>,
    pong: WeakUnboundedSender<Vec<u8>>,
    outbox: UnboundedReceiver<Vec<u8>>,
) -> DriverResult<SocketAddr> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DriverError::ConnectionError(format!("Failed to start runtime: {}", e)))?;

    let (ready_tx, ready_rx) = oneshot::channel();
    let config = config.clone();

    std::thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let stream = match open_socket(&config).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let peer = stream.peer_addr().ok();
                if ready_tx.send(Ok(peer)).is_err() {
                    return;
                }
                run(stream, table, &close, pong, outbox, config.max_frame_size).await;
            });
        })
        .map_err(|e| {
            DriverError::ConnectionError(format!("Failed to spawn reactor thread: {}", e))
        })?;

    let peer = ready_rx.blocking_recv().map_err(|_| {
        DriverError::ConnectionError("Reactor exited before connecting".to_string())
    })??;

    peer.ok_or_else(|| DriverError::ConnectionError("Socket has no peer address".to_string()))
}

async fn open_socket(config: &ConnectionConfig) -> DriverResult<TcpStream> {
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Connecting to {}", addr);

    let stream = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    .map_err(|_| {
        DriverError::ConnectionError(format!(
            "Timed out connecting to {} after {:?}",
            addr, config.connect_timeout
        ))
    })?
    .map_err(|e| DriverError::ConnectionError(format!("Failed to connect to {}: {}", addr, e)))?;

    stream.set_nodelay(config.nodelay).map_err(|e| {
        DriverError::ConnectionError(format!("Failed to set TCP_NODELAY: {}", e))
    })?;

    Ok(stream)
}

/// Drive the socket until it fails or is closed, then fail every waiter
async fn run(
    stream: TcpStream,
    table: Arc<PendingTable>,
    close: &Notify,
    pong: WeakUnboundedSender<Vec<u8>>,
    outbox: UnboundedReceiver<Vec<u8>>,
    max_frame_size: usize,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let (read_half, write_half) = stream.into_split();

    let result = tokio::select! {
        r = read_loop(read_half, &table, &pong, max_frame_size) => r,
        r = write_loop(write_half, outbox) => r,
        // also cancels a write blocked on a full send buffer
        _ = close.notified() => Ok(()),
    };

    let error = match result {
        Ok(()) => {
            tracing::info!("Connection to {} closed", peer);
            DriverError::ConnectionError("Connection closed".to_string())
        }
        Err(e) => {
            tracing::warn!("Connection to {} failed: {}", peer, e);
            match e {
                DriverError::ConnectionError(_) => e,
                other => DriverError::ConnectionError(other.to_string()),
            }
        }
    };
    table.fail(error);
}

async fn read_loop(
    read_half: OwnedReadHalf,
    table: &PendingTable,
    pong: &WeakUnboundedSender<Vec<u8>>,
    max_frame_size: usize,
) -> DriverResult<()> {
    let mut reader = BufReader::new(read_half);
    loop {
        match read_frame(&mut reader, max_frame_size).await? {
            Frame::Empty => tracing::trace!("Empty frame"),
            Frame::Heartbeat => {
                tracing::debug!("Heartbeat received, sending pong");
                if let Some(tx) = pong.upgrade() {
                    let _ = tx.send(EMPTY_FRAME.to_vec());
                }
            }
            Frame::Payload(payload) => dispatch(table, &payload),
        }
    }
}

fn dispatch(table: &PendingTable, payload: &[u8]) {
    match decode_response(payload) {
        Ok(response) => {
            tracing::trace!(
                ticker = response.ticker,
                ok = response.result.is_ok(),
                "Response received"
            );
            table.resolve(response.ticker, response.result);
        }
        Err(e) => {
            tracing::warn!("Dropping undecodable frame of {} bytes: {}", payload.len(), e);
        }
    }
}

/// Frames queued while a write is in flight go out together in the next one
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbox: UnboundedReceiver<Vec<u8>>,
) -> DriverResult<()> {
    let mut buf = Vec::new();
    loop {
        let mut closing = match outbox.recv().await {
            Some(frame) => {
                buf.extend_from_slice(&frame);
                false
            }
            None => true,
        };

        while !closing {
            match outbox.try_recv() {
                Ok(frame) => buf.extend_from_slice(&frame),
                Err(TryRecvError::Disconnected) => closing = true,
                Err(TryRecvError::Empty) => break,
            }
        }

        if !buf.is_empty() {
            writer
                .write_all(&buf)
                .await
                .map_err(|e| DriverError::ConnectionError(format!("Write failed: {}", e)))?;
            buf.clear();
        }

        if closing {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Socket shutdown failed: {}", e);
            }
            return Ok(());
        }
    }
}
