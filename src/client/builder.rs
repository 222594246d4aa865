use std::time::Duration;

use super::Connection;
use crate::protocol::{DriverResult, MAX_MESSAGE_SIZE};

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Resolved connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database selected with `use` right after connecting
    pub database: Option<String>,
    pub connect_timeout: Duration,
    /// Default bound for [`ResponseFuture::get`](super::ResponseFuture::get)
    /// and the blocking calls; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    pub nodelay: bool,
    /// Largest frame payload accepted in either direction
    pub max_frame_size: usize,
}

/// Builder for creating a Connection with additional options
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    /// Create a new builder
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            config: ConnectionConfig {
                host: host.to_string(),
                port,
                database: None,
                connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
                request_timeout: None,
                nodelay: true,
                max_frame_size: MAX_MESSAGE_SIZE,
            },
        }
    }

    /// Select a database once connected
    pub fn database(mut self, name: &str) -> Self {
        self.config.database = Some(name.to_string());
        self
    }

    /// Set the TCP connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout = Duration::from_millis(ms);
        self
    }

    /// Set the default request timeout in milliseconds (0 = none)
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect, then select the database if one was given
    pub fn connect(self) -> DriverResult<Connection> {
        let database = self.config.database.clone();
        let conn = Connection::open(self.config)?;

        if let Some(database) = database {
            conn.use_database(&database)?;
        }

        Ok(conn)
    }
}
