use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::pending::PendingTable;
use crate::protocol::{DriverError, DriverResult, Outcome, ResultSet, Ticker};

/// Handle to the eventual outcome of one request
pub struct ResponseFuture {
    ticker: Ticker,
    table: Arc<PendingTable>,
    default_timeout: Option<Duration>,
    resolved: Mutex<Option<DriverResult<Outcome>>>,
}

impl ResponseFuture {
    pub(crate) fn new(
        ticker: Ticker,
        table: Arc<PendingTable>,
        default_timeout: Option<Duration>,
    ) -> Self {
        table.register(ticker);
        Self {
            ticker,
            table,
            default_timeout,
            resolved: Mutex::new(None),
        }
    }

    pub fn ticker(&self) -> Ticker {
        self.ticker
    }

    /// Block until the rows arrive, using the connection's default timeout.
    ///
    /// A scalar outcome yields an empty result set.
    pub fn get(&self) -> DriverResult<ResultSet> {
        self.get_outcome(self.default_timeout)
            .map(Outcome::into_result_set)
    }

    /// Like [`get`](Self::get) with an explicit bound; zero waits indefinitely
    pub fn get_timeout(&self, timeout: Duration) -> DriverResult<ResultSet> {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.get_outcome(timeout).map(Outcome::into_result_set)
    }

    /// Raw outcome, rows or scalar.
    ///
    /// Once resolved, later calls return the same outcome. A timeout is not
    /// remembered; calling again keeps waiting for the response.
    pub fn get_outcome(&self, timeout: Option<Duration>) -> DriverResult<Outcome> {
        let mut resolved = self.resolved.lock();
        if let Some(result) = resolved.as_ref() {
            return result.clone();
        }

        let result = self.table.wait(self.ticker, timeout);
        if !matches!(result, Err(DriverError::Timeout(_))) {
            *resolved = Some(result.clone());
        }
        result
    }
}

impl Drop for ResponseFuture {
    fn drop(&mut self) {
        self.table.release(self.ticker);
    }
}

impl fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("ticker", &self.ticker)
            // None while another thread is waiting
            .field("resolved", &self.resolved.try_lock().map(|r| r.is_some()))
            .finish()
    }
}
