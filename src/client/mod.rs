//! OpenTick client
//!
//! A [`Connection`] multiplexes requests from any number of threads onto one
//! TCP socket. Each request gets a fresh ticker; the reactor matches responses
//! back to their [`ResponseFuture`] by ticker, in whatever order they arrive.

mod builder;
mod bulk;
mod database;
mod future;
mod pending;
mod prepared;
mod query;
mod reactor;

pub use builder::{ConnectionBuilder, ConnectionConfig};
pub use future::ResponseFuture;
pub use pending::ConnectionStatus;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Notify;

use crate::protocol::codec::encode_command_with_limit;
use crate::protocol::{Command, DriverResult, Ticker};
use pending::PendingTable;
use prepared::StatementCache;

struct Inner {
    config: ConnectionConfig,
    peer: SocketAddr,
    tickers: AtomicI64,
    table: Arc<PendingTable>,
    prepared: StatementCache,
    outbox: UnboundedSender<Vec<u8>>,
    close: Arc<Notify>,
}

/// Handle to one live connection; clones share the socket
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Open the socket and start the reactor thread.
    ///
    /// Blocks the calling thread; must not be called from async code.
    pub fn open(config: ConnectionConfig) -> DriverResult<Self> {
        let table = Arc::new(PendingTable::new());
        let (outbox, rx) = mpsc::unbounded_channel();
        let close = Arc::new(Notify::new());
        let peer = reactor::spawn(&config, table.clone(), close.clone(), outbox.downgrade(), rx)?;
        tracing::info!("Connected to {}", peer);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                peer,
                tickers: AtomicI64::new(0),
                table,
                prepared: StatementCache::new(),
                outbox,
                close,
            }),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    pub fn is_connected(&self) -> bool {
        self.inner.table.is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.table.status()
    }

    /// Tell the reactor to drop the socket. Does not block, and takes effect
    /// even while a write is stuck on a peer that stopped reading. Every
    /// pending and later request fails with a connection error.
    pub fn close(&self) {
        tracing::info!("Closing connection to {}", self.inner.peer);
        self.inner.close.notify_one();
    }

    /// Number of cached prepared statements
    pub fn prepared_count(&self) -> usize {
        self.inner.prepared.len()
    }

    /// Outcomes that arrived but have not been collected by a live future.
    /// Dropping a future discards its outcome.
    pub fn pending_count(&self) -> usize {
        self.inner.table.len()
    }

    fn next_ticker(&self) -> Ticker {
        self.inner.tickers.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Queue one request and hand back the future for its ticker
    pub(crate) fn send_command(&self, command: Command) -> DriverResult<ResponseFuture> {
        self.inner.table.check_open()?;

        let ticker = self.next_ticker();
        let frame = encode_command_with_limit(ticker, &command, self.inner.config.max_frame_size)?;
        tracing::trace!(ticker, command = command.name(), bytes = frame.len(), "Queue request");

        // registered before the frame can reach the server; released on drop
        let future = ResponseFuture::new(
            ticker,
            self.inner.table.clone(),
            self.inner.config.request_timeout,
        );
        self.inner
            .outbox
            .send(frame)
            .map_err(|_| self.inner.table.closed_error())?;

        Ok(future)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.inner.peer)
            .field("status", &self.inner.table.status())
            .finish()
    }
}
