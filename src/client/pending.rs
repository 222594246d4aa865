use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::protocol::{DriverError, DriverResult, Outcome, Ticker};

/// Connection-wide state consulted by every waiter
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    /// Terminal; holds the error every waiter observes
    Closed(DriverError),
}

struct TableState {
    /// Tickers with a live future; responses for any other ticker are dropped
    waiting: HashSet<Ticker>,
    outcomes: HashMap<Ticker, DriverResult<Outcome>>,
    status: ConnectionStatus,
}

/// Outcomes keyed by ticker, shared by the reactor and every caller thread.
///
/// The reactor writes, callers take. Both maps are bounded by the number of
/// live futures. The lock is never held across I/O.
pub struct PendingTable {
    state: Mutex<TableState>,
    changed: Condvar,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                waiting: HashSet::new(),
                outcomes: HashMap::new(),
                status: ConnectionStatus::Connected,
            }),
            changed: Condvar::new(),
        }
    }

    /// Accept a response for `ticker`. Must happen before the request is sent.
    pub fn register(&self, ticker: Ticker) {
        self.state.lock().waiting.insert(ticker);
    }

    /// Forget `ticker`: its stored outcome goes, a later response is dropped
    pub fn release(&self, ticker: Ticker) {
        let mut state = self.state.lock();
        state.waiting.remove(&ticker);
        if state.outcomes.remove(&ticker).is_some() {
            tracing::debug!(ticker, "Discarding uncollected response");
        }
    }

    /// Store the outcome for `ticker` and wake all waiters
    pub fn resolve(&self, ticker: Ticker, result: DriverResult<Outcome>) {
        let mut state = self.state.lock();
        if !state.waiting.contains(&ticker) {
            tracing::debug!(ticker, "Dropping response with no waiter");
            return;
        }
        if state.outcomes.contains_key(&ticker) {
            tracing::warn!(ticker, "Duplicate response ignored");
            return;
        }
        state.outcomes.insert(ticker, result);
        drop(state);
        self.changed.notify_all();
    }

    /// Mark the connection closed. Only the first error is kept.
    pub fn fail(&self, error: DriverError) -> bool {
        let mut state = self.state.lock();
        if state.status != ConnectionStatus::Connected {
            return false;
        }
        state.status = ConnectionStatus::Closed(error);
        drop(state);
        self.changed.notify_all();
        true
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().status == ConnectionStatus::Connected
    }

    /// Fail fast once the connection is closed
    pub fn check_open(&self) -> DriverResult<()> {
        match &self.state.lock().status {
            ConnectionStatus::Connected => Ok(()),
            ConnectionStatus::Closed(err) => Err(err.clone()),
        }
    }

    /// The error to report when the reactor is gone
    pub fn closed_error(&self) -> DriverError {
        match &self.state.lock().status {
            ConnectionStatus::Closed(err) => err.clone(),
            ConnectionStatus::Connected => {
                DriverError::ConnectionError("Connection closed".to_string())
            }
        }
    }

    /// Outcomes stored but not yet collected
    pub fn len(&self) -> usize {
        self.state.lock().outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tickers that still accept a response
    pub fn waiting_len(&self) -> usize {
        self.state.lock().waiting.len()
    }

    /// Block until `ticker` resolves, the connection closes, or `timeout`
    /// elapses. `None` waits indefinitely.
    ///
    /// The ticker's own outcome wins over a closed connection. A collected
    /// outcome is removed and the ticker stops accepting responses. A
    /// timeout leaves the ticker registered, so a late response is kept for
    /// the next wait.
    pub fn wait(&self, ticker: Ticker, timeout: Option<Duration>) -> DriverResult<Outcome> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();

        loop {
            if let Some(result) = state.outcomes.remove(&ticker) {
                state.waiting.remove(&ticker);
                return result;
            }
            if let ConnectionStatus::Closed(err) = &state.status {
                return Err(err.clone());
            }
            match deadline {
                None => self.changed.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(DriverError::Timeout(timeout.unwrap_or_default()));
                    }
                    self.changed.wait_until(&mut state, deadline);
                }
            }
        }
    }
}
