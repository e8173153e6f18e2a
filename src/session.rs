//! Handling of one accepted connection, from the first read to close.
//!
//! A session runs to completion in a single pass:
//!
//! 1. read the request, waiting at most [`SessionConfig::read_timeout`]
//! 2. if it's a control request, decode the hex payload and write it to the bus
//! 3. send the status page, taking and clearing the pending [`StatusMessage`]
//! 4. close the connection
//!
//! Step 4 is tied to [`ConnectionGuard`]'s `Drop`, so it runs exactly once on
//! every path. Nothing that goes wrong inside a session is returned as an error;
//! the result is reported as a [`SessionOutcome`].

use log::{debug, error, info, warn};

use core::ops::{Deref, DerefMut};
use std::io;
use std::time::Duration;

use crate::bridge::BridgeState;
use crate::capture::SerialPeripheral;
use crate::codec::{self, DecodeError};
use crate::page::Render;
use crate::request::{PendingRequest, REQUEST_CAPACITY};
use crate::transport::{Connection, TransportError};

/// Status line and headers sent ahead of every page.
pub const RESPONSE_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Connection: close\r\n\r\n";

/// Timing of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Longest wait for request bytes after accept.
    pub read_timeout: Duration,
    /// Pause before transmitting, leaving the bus idle for a moment.
    pub bus_idle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            bus_idle_delay: Duration::from_millis(50),
        }
    }
}

/// What a session did with its request.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The frame was decoded and written to the bus.
    Transmitted(Vec<u8>),
    /// The hex payload was malformed, nothing was written.
    DecodeFailed(DecodeError),
    /// The frame was decoded but the bus write failed.
    WriteFailed(io::Error),
    /// Not a control request (or no request at all).
    NoAction,
    /// No request bytes arrived within the read timeout.
    ReadTimeout,
    /// Reading the request failed for a reason other than a timeout.
    ReadFailed(TransportError),
}

impl SessionOutcome {
    /// The text to show on the next page, if any.
    pub fn status_message(&self) -> Option<String> {
        match self {
            Self::Transmitted(frame) => Some(format!("Frame sent: {}", codec::encode(frame))),
            Self::DecodeFailed(err) => Some(format!("Error: {}", err)),
            Self::WriteFailed(err) => Some(format!("Error: {}", err)),
            Self::NoAction | Self::ReadTimeout | Self::ReadFailed(_) => None,
        }
    }
}

/// Single slot message shown on the next rendered page, then cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMessage(Option<String>);

impl StatusMessage {
    pub fn set(&mut self, message: impl Into<String>) {
        self.0 = Some(message.into());
    }

    /// Take the message, leaving the slot empty.
    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Owns a connection and closes it when dropped. Close errors are logged and dropped.
#[derive(Debug)]
pub struct ConnectionGuard<C: Connection> {
    conn: C,
}

impl<C: Connection> ConnectionGuard<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.conn.close() {
            debug!("ignoring close error: {}", e);
        }
    }
}

/// Serve one accepted connection.
///
/// Reads the request, injects its frame if it carries one, and answers with the
/// page produced by `renderer`. The connection is closed before returning.
pub fn handle_session<C, S, R>(
    conn: C,
    serial: &mut S,
    state: &mut BridgeState,
    renderer: &R,
    config: &SessionConfig,
) -> SessionOutcome
where
    C: Connection,
    S: SerialPeripheral + ?Sized,
    R: Render + ?Sized,
{
    let mut conn = ConnectionGuard::new(conn);

    let outcome = match receive_request(&mut *conn, config.read_timeout) {
        Ok(request) if request.is_empty() => SessionOutcome::NoAction,
        Ok(request) => process_request(&request, serial, config.bus_idle_delay),
        Err(TransportError::Timeout) => {
            debug!("request read timed out");
            SessionOutcome::ReadTimeout
        }
        Err(e) => {
            warn!("failed to read request: {}", e);
            SessionOutcome::ReadFailed(e)
        }
    };

    if let Some(message) = outcome.status_message() {
        state.status.set(message);
    }
    let status = state.status.take();
    let page = renderer.render(status.as_deref().unwrap_or(""), state.frame.as_ref());
    if let Err(e) = send_response(&mut *conn, page.as_bytes()) {
        warn!("failed to send response: {}", e);
    }

    outcome
}

/// Read once, waiting at most `timeout`.
pub fn receive_request<C>(conn: &mut C, timeout: Duration) -> Result<PendingRequest, TransportError>
where
    C: Connection + ?Sized,
{
    let mut buf = [0; REQUEST_CAPACITY];
    let len = conn.read(&mut buf, timeout)?;
    debug!("request received, {} bytes", len);
    Ok(PendingRequest::from(&buf[..len]))
}

/// Decode and transmit the frame carried by `request`, if any.
pub fn process_request<S>(request: &PendingRequest, serial: &mut S, bus_idle_delay: Duration) -> SessionOutcome
where
    S: SerialPeripheral + ?Sized,
{
    let hex = match request.hex_payload() {
        Some(hex) => hex,
        None => return SessionOutcome::NoAction,
    };
    match codec::decode(&hex) {
        Ok(frame) => transmit(serial, frame, bus_idle_delay),
        Err(e) => {
            warn!("rejected frame: {}", e);
            SessionOutcome::DecodeFailed(e)
        }
    }
}

/// Write `frame` to the bus after leaving it idle for `bus_idle_delay`.
///
/// There is no collision detection.
pub fn transmit<S>(serial: &mut S, frame: Vec<u8>, bus_idle_delay: Duration) -> SessionOutcome
where
    S: SerialPeripheral + ?Sized,
{
    if !bus_idle_delay.is_zero() {
        std::thread::sleep(bus_idle_delay);
    }
    match serial.write(&frame) {
        Ok(()) => {
            info!("bus tx: {}", codec::encode(&frame));
            SessionOutcome::Transmitted(frame)
        }
        Err(e) => {
            error!("bus write failed: {}", e);
            SessionOutcome::WriteFailed(e)
        }
    }
}

fn send_response<C>(conn: &mut C, page: &[u8]) -> Result<(), TransportError>
where
    C: Connection + ?Sized,
{
    conn.write_all(RESPONSE_HEAD)?;
    conn.write_all(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingConn {
        closes: Rc<Cell<usize>>,
        fail_close: bool,
    }

    impl Connection for CountingConn {
        fn read(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
            Err(TransportError::Timeout)
        }

        fn write_all(&mut self, _data: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), TransportError> {
            self.closes.set(self.closes.get() + 1);
            if self.fail_close {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone").into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_guard_closes_once() {
        for fail_close in [false, true] {
            let closes = Rc::new(Cell::new(0));
            {
                let mut guard = ConnectionGuard::new(CountingConn {
                    closes: Rc::clone(&closes),
                    fail_close,
                });
                assert!(guard.read(&mut [0; 4], Duration::ZERO).is_err());
                assert_eq!(closes.get(), 0);
            }
            assert_eq!(closes.get(), 1);
        }
    }

    #[test]
    fn test_status_message_slot() {
        let mut status = StatusMessage::default();
        assert!(status.is_empty());
        status.set("one");
        status.set("two");
        assert_eq!(status.get(), Some("two"));
        assert_eq!(status.take(), Some("two".to_string()));
        assert!(status.is_empty());
        assert_eq!(status.take(), None);
    }

    #[test]
    fn test_outcome_messages() {
        let sent = SessionOutcome::Transmitted(vec![0xFD, 0xA0, 0x09]);
        assert_eq!(sent.status_message().unwrap(), "Frame sent: FD A0 09");

        let failed = SessionOutcome::DecodeFailed(codec::decode("GG").unwrap_err());
        assert_eq!(
            failed.status_message().unwrap(),
            "Error: non-hexadecimal digit in \"GG\""
        );

        assert!(SessionOutcome::NoAction.status_message().is_none());
        assert!(SessionOutcome::ReadTimeout.status_message().is_none());
    }

    #[test]
    fn test_response_head() {
        let head = std::str::from_utf8(RESPONSE_HEAD).unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(head.ends_with("Connection: close\r\n\r\n"));
    }
}
