//! Sniffer and frame injector for a 2400 baud HVAC field bus (iBUS).
//!
//! The bridge passively records the last burst of bytes seen on the bus, and
//! serves a small HTML page showing it. Submitting the page's form with a frame
//! written as hex (`FD A0 09`, `0xFD,0xA0,0x09`, ...) writes those bytes onto
//! the bus. Frames are opaque: nothing here knows what the bytes mean.
//!
//! All work happens on a single thread in [`Bridge::poll()`]:
//!
//! * [`capture`] drains the UART without blocking
//! * [`transport`] accepts at most one connection, with a short bounded wait
//! * [`session`] serves that connection and always closes it
//! * [`request`] and [`codec`] turn the form submission into bus bytes
//!
//! The serial port and the TCP listener sit behind the [`SerialPeripheral`],
//! [`Listener`] and [`Connection`] traits, so the loop can be driven by
//! simulated peripherals in tests.

pub mod bridge;
pub mod capture;
pub mod codec;
pub mod page;
pub mod request;
pub mod session;
pub mod transport;
#[cfg(feature = "serial")]
pub mod uart;

pub use bridge::{Bridge, BridgeConfig, BridgeState, Iteration};
pub use capture::{poll_capture, CapturedFrame, SerialPeripheral};
pub use codec::{decode, encode, DecodeError};
pub use page::{Render, StatusPage};
pub use request::{extract_hex_payload, PendingRequest};
pub use session::{handle_session, SessionConfig, SessionOutcome, StatusMessage};
pub use transport::{Connection, Listener, TcpAcceptor, TcpConnection, TransportError};
