//! Mock OpenTick server for client tests
//!
//! Accepts a single connection on loopback, records every request, and
//! replies through a handler. Tests can also push raw frames (heartbeats,
//! garbage, late responses) or drop the socket.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use opentick_client::protocol::{
    decode_request, encode_response, Command, Response, Statement, EMPTY_FRAME, HEARTBEAT,
};
use opentick_client::{ResultSet, Ticker, Value};

pub type Handler = Arc<dyn Fn(Ticker, &Command) -> Option<Response> + Send + Sync>;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<(Ticker, Command)>>>,
    pongs: Arc<AtomicUsize>,
    writer: Arc<Mutex<Option<TcpStream>>>,
}

impl MockServer {
    pub fn start() -> Self {
        Self::with_handler(Arc::new(standard_reply))
    }

    pub fn with_handler(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let pongs = Arc::new(AtomicUsize::new(0));
        let writer: Arc<Mutex<Option<TcpStream>>> = Arc::new(Mutex::new(None));

        {
            let requests = requests.clone();
            let pongs = pongs.clone();
            let writer = writer.clone();
            thread::spawn(move || {
                let (mut stream, _) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                *writer.lock().unwrap() = Some(stream.try_clone().unwrap());

                while let Some(payload) = read_frame(&mut stream) {
                    if payload.is_empty() {
                        pongs.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }
                    let (ticker, command) = decode_request(&payload).expect("valid request");
                    let reply = handler(ticker, &command);
                    requests.lock().unwrap().push((ticker, command));
                    if let Some(response) = reply {
                        let frame = encode_response(&response).unwrap();
                        if let Some(out) = writer.lock().unwrap().as_mut() {
                            let _ = out.write_all(&frame);
                        }
                    }
                }
            });
        }

        Self {
            addr,
            requests,
            pongs,
            writer,
        }
    }

    /// Accepts the connection but never reads, so the client's writes back up
    pub fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        let writer: Arc<Mutex<Option<TcpStream>>> = Arc::new(Mutex::new(None));

        {
            let writer = writer.clone();
            thread::spawn(move || {
                if let Ok((stream, _)) = listener.accept() {
                    *writer.lock().unwrap() = Some(stream);
                }
            });
        }

        Self {
            addr,
            requests: Arc::new(Mutex::new(Vec::new())),
            pongs: Arc::new(AtomicUsize::new(0)),
            writer,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<(Ticker, Command)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.requests().into_iter().map(|(_, c)| c).collect()
    }

    pub fn pongs(&self) -> usize {
        self.pongs.load(Ordering::SeqCst)
    }

    /// Write raw bytes to the client
    pub fn send_raw(&self, bytes: &[u8]) {
        self.with_writer(|out| out.write_all(bytes).unwrap());
    }

    pub fn send_heartbeat(&self) {
        self.send_raw(&[1, 0, 0, 0, HEARTBEAT]);
    }

    pub fn send_empty(&self) {
        self.send_raw(&EMPTY_FRAME);
    }

    pub fn respond(&self, response: Response) {
        self.send_raw(&encode_response(&response).unwrap());
    }

    /// Drop the socket as if the server went away
    pub fn disconnect(&self) {
        self.with_writer(|out| {
            let _ = out.shutdown(Shutdown::Both);
        });
    }

    pub fn wait_for_requests(&self, count: usize) -> Vec<(Ticker, Command)> {
        wait_until(|| self.requests.lock().unwrap().len() >= count);
        self.requests()
    }

    pub fn wait_for_pongs(&self, count: usize) {
        wait_until(|| self.pongs() >= count);
    }

    fn with_writer(&self, f: impl FnOnce(&mut TcpStream)) {
        wait_until(|| self.writer.lock().unwrap().is_some());
        let mut guard = self.writer.lock().unwrap();
        f(guard.as_mut().unwrap());
    }
}

/// Blocking frame read; `None` on EOF
fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).ok()?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).ok()?;
    Some(payload)
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < WAIT_LIMIT, "mock server wait timed out");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Id the mock assigns to a prepared statement
pub fn prepared_id(sql: &str) -> i64 {
    100 + sql.len() as i64
}

/// Default behaviour:
/// - `use` is acknowledged with null
/// - `prepare` returns [`prepared_id`]
/// - `SELECT 1` returns `[[1]]`
/// - SQL starting with `BAD` fails with `syntax error`
/// - SQL starting with `SLEEP` never gets a reply
/// - any other `run` echoes its args as one row
/// - `batch` returns the row count
pub fn standard_reply(ticker: Ticker, command: &Command) -> Option<Response> {
    match command {
        Command::Use { .. } => Some(Response::scalar(ticker, Value::Null)),
        Command::Prepare { sql } => Some(Response::scalar(ticker, Value::Int64(prepared_id(sql)))),
        Command::Run {
            statement: Statement::Sql(sql),
            ..
        } if sql.starts_with("SLEEP") => None,
        Command::Run {
            statement: Statement::Sql(sql),
            ..
        } if sql.starts_with("BAD") => Some(Response::error(ticker, "syntax error")),
        Command::Run {
            statement: Statement::Sql(sql),
            ..
        } if sql == "SELECT 1" => Some(Response::rows(
            ticker,
            ResultSet::new(vec![vec![Value::Int64(1)]]),
        )),
        Command::Run { args, .. } => Some(Response::rows(ticker, ResultSet::new(vec![args.clone()]))),
        Command::Batch { rows, .. } => {
            Some(Response::scalar(ticker, Value::Int64(rows.len() as i64)))
        }
    }
}
