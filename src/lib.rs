//! OpenTick Rust Client
//!
//! Native client for the OpenTick timeseries database. Requests from any
//! number of threads share one TCP connection; each is tagged with a ticker
//! and its response is routed back to the matching [`ResponseFuture`].
//!
//! # Example
//!
//! ```no_run
//! use opentick_client::{connect, Value};
//!
//! fn main() -> Result<(), opentick_client::DriverError> {
//!     let conn = connect("127.0.0.1", 1116, Some("market"))?;
//!
//!     conn.batch_insert(
//!         "INSERT INTO bar(sec, tm, close) VALUES(?, ?, ?)",
//!         &[vec![Value::from(1i64), Value::from(chrono::Utc::now()), Value::from(9.5)]],
//!     )?;
//!
//!     let pending = conn.execute_async("SELECT * FROM bar WHERE sec = ?", &[Value::from(1i64)])?;
//!     for row in pending.get()? {
//!         println!("{:?}", row);
//!     }
//!
//!     conn.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod protocol;

pub use client::{
    Connection, ConnectionBuilder, ConnectionConfig, ConnectionStatus, ResponseFuture,
};
pub use protocol::{DriverError, DriverResult, Outcome, ResultSet, Row, Ticker, Value};

/// Connect to `host:port` and optionally select `database`
pub fn connect(host: &str, port: u16, database: Option<&str>) -> DriverResult<Connection> {
    let mut builder = ConnectionBuilder::new(host, port);
    if let Some(database) = database {
        builder = builder.database(database);
    }
    builder.connect()
}
