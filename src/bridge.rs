//! The poll loop tying bus capture and the control page together.
//!
//! Everything runs on one thread. Each iteration first drains the serial
//! peripheral, then waits briefly for a connection and serves it to completion.
//! The two bounded waits (accept and request read) are the only places the loop
//! can stall, so a slow client delays bus capture by at most the read timeout.

use log::error;

use std::time::Duration;

use crate::capture::{poll_capture, CapturedFrame, SerialPeripheral};
use crate::page::{Render, StatusPage};
use crate::session::{handle_session, SessionConfig, SessionOutcome, StatusMessage};
use crate::transport::Listener;

/// Timing knobs for the loop. The defaults are the values the bridge was tuned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Longest wait for an incoming connection per iteration.
    pub accept_wait: Duration,
    pub session: SessionConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            accept_wait: Duration::from_millis(50),
            session: SessionConfig::default(),
        }
    }
}

/// State shared between capture and sessions. Only the loop writes to it.
#[derive(Debug, Clone, Default)]
pub struct BridgeState {
    /// Last frame read from the bus, replaced on every capture.
    pub frame: Option<CapturedFrame>,
    /// Message for the next rendered page.
    pub status: StatusMessage,
}

/// Result of one loop iteration.
#[derive(Debug)]
pub struct Iteration {
    /// A new frame replaced the captured one.
    pub captured: bool,
    /// Present if a connection was accepted and served.
    pub session: Option<SessionOutcome>,
}

/// Single threaded bus/network bridge.
///
/// ```
/// use ibus_bridge::{Bridge, BridgeConfig, StatusPage, TcpAcceptor};
/// # use ibus_bridge::SerialPeripheral;
/// # struct Idle;
/// # impl SerialPeripheral for Idle {
/// #     fn bytes_available(&mut self) -> std::io::Result<usize> { Ok(0) }
/// #     fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> { Ok(0) }
/// #     fn write(&mut self, _: &[u8]) -> std::io::Result<()> { Ok(()) }
/// # }
/// # fn main() -> std::io::Result<()> {
/// let listener = TcpAcceptor::bind("127.0.0.1:0")?;
/// let mut bridge = Bridge::new(Idle, listener, StatusPage, BridgeConfig::default());
/// let iteration = bridge.poll();
/// assert!(!iteration.captured);
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Bridge<S, L, R = StatusPage> {
    serial: S,
    listener: L,
    renderer: R,
    config: BridgeConfig,
    state: BridgeState,
}

impl<S, L, R> Bridge<S, L, R>
where
    S: SerialPeripheral,
    L: Listener,
    R: Render,
{
    pub fn new(serial: S, listener: L, renderer: R, config: BridgeConfig) -> Self {
        Self {
            serial,
            listener,
            renderer,
            config,
            state: BridgeState::default(),
        }
    }

    /// Run one iteration: capture, then at most one session.
    ///
    /// Errors from the peripheral or the listener are logged and the iteration
    /// carries on, so the next call always starts with a fresh capture.
    pub fn poll(&mut self) -> Iteration {
        let captured = match poll_capture(&mut self.serial) {
            Ok(Some(frame)) => {
                self.state.frame = Some(frame);
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("bus capture failed: {}", e);
                false
            }
        };

        let session = match self.listener.accept(self.config.accept_wait) {
            Ok(Some(conn)) => Some(handle_session(
                conn,
                &mut self.serial,
                &mut self.state,
                &self.renderer,
                &self.config.session,
            )),
            Ok(None) => None,
            Err(e) if e.is_timeout() => None,
            Err(e) => {
                error!("accept failed: {}", e);
                None
            }
        };

        Iteration { captured, session }
    }

    /// Poll forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }
}
