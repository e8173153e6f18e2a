//! [`SerialPeripheral`] over a host serial port.

use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::capture::SerialPeripheral;

/// Bus line rate.
pub const BAUD_RATE: u32 = 2400;

/// Read timeout of the port. Reads only happen when bytes are already buffered,
/// so this is never actually waited for in normal operation.
const PORT_TIMEOUT: Duration = Duration::from_millis(10);

/// Open `path` at 2400 baud, 8 data bits, no parity, one stop bit.
///
/// The bus idles with an inverted TX line. `serialport` can't invert signals, so
/// that has to be done by the adapter hardware.
pub fn open(path: &str) -> serialport::Result<Box<dyn SerialPort>> {
    let port = serialport::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(PORT_TIMEOUT)
        .open()?;
    debug!("opened {} at {} baud", path, BAUD_RATE);
    Ok(port)
}

impl SerialPeripheral for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Read::read(self, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            r => r,
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)?;
        self.flush()
    }
}
