//! Passive capture of bus traffic.
//!
//! The bus is sampled with [`poll_capture()`], which never waits for data. Whatever
//! the peripheral has buffered is read in one go and becomes the new
//! [`CapturedFrame`]. There is no queue: the caller replaces its previous frame,
//! so bursts that arrive faster than they are polled are lost.

use log::info;
use snafu::{ResultExt, Snafu};

use core::ops::Deref;
use std::io;

use crate::codec;

/// Error type for this module
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The serial peripheral reported an I/O failure.
    #[snafu(display("Serial peripheral error: {}", source))]
    Serial { source: io::Error },
}

/// The three operations the bridge needs from a UART.
///
/// Line settings (2400 baud, 8N1, inverted TX) are applied when the peripheral
/// is opened and are not visible through this trait.
pub trait SerialPeripheral {
    /// Number of received bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read buffered bytes into `buf`, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Transmit `data` on the bus.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<S: SerialPeripheral + ?Sized> SerialPeripheral for &mut S {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }
}

/// The most recent burst of bytes read from the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedFrame(Vec<u8>);

impl CapturedFrame {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Upper case hex, e.g. `"FD A0 09"`.
    pub fn to_hex(&self) -> String {
        codec::encode(&self.0)
    }

    /// Space separated decimal values, e.g. `"253 160 9"`.
    pub fn to_decimal(&self) -> String {
        self.0
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Deref for CapturedFrame {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for CapturedFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl PartialEq<[u8]> for CapturedFrame {
    fn eq(&self, other: &[u8]) -> bool {
        self.0.as_slice() == other
    }
}

/// Read whatever the peripheral has buffered, without waiting.
///
/// The read buffer is sized from the peripheral's own count, so a whole burst
/// ends up in one frame however long it is. Returns `Ok(None)` when nothing is
/// available, or when the read itself returned no bytes. A read that returns fewer bytes than were reported available is
/// accepted as is.
///
/// # Errors
/// Returns [`Error::Serial`] if the peripheral fails.
pub fn poll_capture<S>(serial: &mut S) -> Result<Option<CapturedFrame>, Error>
where
    S: SerialPeripheral + ?Sized,
{
    let available = serial.bytes_available().context(SerialSnafu)?;
    if available == 0 {
        return Ok(None);
    }

    let mut buf = vec![0; available];
    let len = serial.read(&mut buf).context(SerialSnafu)?;
    if len == 0 {
        return Ok(None);
    }
    buf.truncate(len);

    let frame = CapturedFrame::from(buf);
    info!("bus rx: {}", frame.to_hex());
    Ok(Some(frame))
}
