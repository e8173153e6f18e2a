#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::rc::Rc;
use std::time::{Duration, Instant};

use ibus_bridge::{BridgeConfig, Connection, Listener, SerialPeripheral, SessionConfig, TransportError};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config without any waits, for fast tests.
pub fn no_wait_config() -> BridgeConfig {
    BridgeConfig {
        accept_wait: Duration::ZERO,
        session: SessionConfig {
            read_timeout: Duration::ZERO,
            bus_idle_delay: Duration::ZERO,
        },
    }
}

/// Simulated UART. Each queued rx burst is returned by one read.
#[derive(Default)]
pub struct SerialInterface {
    rx: VecDeque<Vec<u8>>,
    pub tx: Vec<Vec<u8>>,
    /// When each entry of `tx` was written.
    pub tx_at: Vec<Instant>,
    pub captures: usize,
    do_read_error: bool,
    do_write_error: bool,
}

pub struct SerialIOPlane(Rc<RefCell<SerialInterface>>);

impl SerialIOPlane {
    pub fn new(serial_if: &Rc<RefCell<SerialInterface>>) -> SerialIOPlane {
        SerialIOPlane(serial_if.clone())
    }
}

impl SerialInterface {
    pub fn new() -> Rc<RefCell<SerialInterface>> {
        Rc::new(RefCell::new(SerialInterface::default()))
    }

    pub fn receive(&mut self, burst: &[u8]) {
        self.rx.push_back(burst.to_vec());
    }

    pub fn trigger_write_error(&mut self) {
        self.do_write_error = true;
    }

    pub fn trigger_read_error(&mut self) {
        self.do_read_error = true;
    }
}

impl SerialPeripheral for SerialIOPlane {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        inner.captures += 1;
        if inner.do_read_error {
            inner.do_read_error = false;
            return Err(Error::new(ErrorKind::Other, "UART overrun"));
        }
        Ok(inner.rx.front().map_or(0, Vec::len))
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        let burst = inner.rx.pop_front().unwrap_or_default();
        let len = burst.len().min(buf.len());
        buf[..len].copy_from_slice(&burst[..len]);
        Ok(len)
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut inner = self.0.borrow_mut();
        if inner.do_write_error {
            inner.do_write_error = false;
            Err(Error::new(ErrorKind::PermissionDenied, "IO write error"))
        } else {
            inner.tx.push(data.to_vec());
            inner.tx_at.push(Instant::now());
            Ok(())
        }
    }
}

/// How a simulated client behaves on the read.
#[derive(Clone)]
pub enum ClientRequest {
    Bytes(Vec<u8>),
    Timeout,
    ReadError,
}

/// Record of what happened to one simulated connection.
#[derive(Default)]
pub struct ConnectionLog {
    pub response: Vec<u8>,
    pub reads: usize,
    pub closes: usize,
}

impl ConnectionLog {
    pub fn response_text(&self) -> String {
        String::from_utf8_lossy(&self.response).into_owned()
    }
}

pub struct SimConnection {
    request: ClientRequest,
    fail_write: bool,
    fail_close: bool,
    log: Rc<RefCell<ConnectionLog>>,
}

impl SimConnection {
    pub fn new(request: ClientRequest) -> (SimConnection, Rc<RefCell<ConnectionLog>>) {
        let log = Rc::new(RefCell::new(ConnectionLog::default()));
        let conn = SimConnection {
            request,
            fail_write: false,
            fail_close: false,
            log: Rc::clone(&log),
        };
        (conn, log)
    }

    pub fn sending(raw: &[u8]) -> (SimConnection, Rc<RefCell<ConnectionLog>>) {
        Self::new(ClientRequest::Bytes(raw.to_vec()))
    }

    pub fn fail_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Connection for SimConnection {
    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.log.borrow_mut().reads += 1;
        match &self.request {
            ClientRequest::Bytes(raw) => {
                let len = raw.len().min(buf.len());
                buf[..len].copy_from_slice(&raw[..len]);
                Ok(len)
            }
            ClientRequest::Timeout => Err(TransportError::Timeout),
            ClientRequest::ReadError => {
                Err(Error::new(ErrorKind::ConnectionReset, "connection reset").into())
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_write {
            return Err(Error::new(ErrorKind::BrokenPipe, "broken pipe").into());
        }
        self.log.borrow_mut().response.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.log.borrow_mut().closes += 1;
        if self.fail_close {
            Err(Error::new(ErrorKind::Other, "close failed").into())
        } else {
            Ok(())
        }
    }
}

/// Listener handing out queued connections, one per accept.
#[derive(Default)]
pub struct SimListener {
    pending: VecDeque<SimConnection>,
    pub accepts: usize,
    do_accept_error: bool,
}

impl SimListener {
    pub fn push(&mut self, conn: SimConnection) {
        self.pending.push_back(conn);
    }

    pub fn trigger_accept_error(&mut self) {
        self.do_accept_error = true;
    }
}

impl Listener for SimListener {
    type Conn = SimConnection;

    fn accept(&mut self, _timeout: Duration) -> Result<Option<SimConnection>, TransportError> {
        self.accepts += 1;
        if self.do_accept_error {
            self.do_accept_error = false;
            return Err(Error::new(ErrorKind::Other, "too many open files").into());
        }
        Ok(self.pending.pop_front())
    }
}

pub fn post_send(hex: &str) -> Vec<u8> {
    let body = format!("hex_data={}", hex);
    format!(
        "POST /send HTTP/1.1\r\nHost: bridge\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub const GET_ROOT: &[u8] = b"GET / HTTP/1.1\r\nHost: bridge\r\n\r\n";
