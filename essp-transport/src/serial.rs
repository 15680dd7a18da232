//! Serial line transport
//!
//! eSSP peripherals talk 9600 baud, 8 data bits, no parity, 2 stop bits.

use std::io::{self, Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::{Transport, error::*};

/// Serial port transport for eSSP peripherals
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    io_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Default line speed
    pub const DEFAULT_BAUD_RATE: u32 = 9600;

    /// Create new serial transport (not yet opened)
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: Self::DEFAULT_BAUD_RATE,
            io_timeout: Duration::from_millis(100),
            port: None,
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the blocking I/O timeout of the underlying port
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Open the port
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyConnected);
        }

        debug!(path = %self.path, baud = self.baud_rate, "Opening serial port");

        let port = serialport::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .timeout(self.io_timeout)
            .open()?;

        self.port = Some(port);
        Ok(())
    }

    /// Close the port
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(path = %self.path, "Closed serial port");
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_ref().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {}", data.len(), hex::encode(data));

        // Writes block until the UART drains, keep them off the runtime threads
        let mut writer = port.try_clone()?;
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(io::Error::other)??;

        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let available = port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        let n = match port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(Error::Io(e)),
        };
        buf.truncate(n);

        trace!("Received {} bytes: {}", n, hex::encode(&buf));
        Ok(buf)
    }

    fn clear_input(&mut self) -> Result<()> {
        let port = self.port.as_ref().ok_or(Error::NotConnected)?;
        port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_transport_create() {
        let transport = SerialTransport::new("/dev/ttyUSB0").with_baud_rate(19200);
        assert!(!transport.is_open());
        assert_eq!(transport.description(), "/dev/ttyUSB0@19200");
    }

    #[tokio::test]
    async fn test_serial_transport_not_open() {
        let mut transport = SerialTransport::new("/dev/ttyUSB0");

        assert!(matches!(transport.write(&[0x7F]).await, Err(Error::NotConnected)));
        assert!(matches!(transport.read_available(), Err(Error::NotConnected)));
    }

    #[test]
    fn test_serial_transport_missing_port() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-essp");
        assert!(transport.open().is_err());
        assert!(!transport.is_open());
    }
}
