use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Byte link to the host.
pub trait ByteTransport {
    /// Next received byte, or `None` if nothing is waiting. Never blocks.
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Queues `bytes` for transmission, blocking while the link is
    /// backpressured.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Holds off transmission for roughly `duration`.
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A UART reached through the `serialport` crate.
pub struct SerialTransport {
    serial: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Write timeout; a full transmit buffer is retried, not reported.
    const TIMEOUT: Duration = Duration::from_millis(10);

    pub fn open(port: &str, baud_rate: u32) -> Result<Self, TransportError> {
        log::debug!("Opening {} at {} baud", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .timeout(Self::TIMEOUT)
            .open()?;
        Self::from_port(serial)
    }

    /// Wraps an already opened port, dropping anything buffered on it.
    pub fn from_port(serial: Box<dyn SerialPort>) -> Result<Self, TransportError> {
        let mut transport = Self { serial };
        transport.flush()?;
        Ok(transport)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.serial.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

impl ByteTransport for SerialTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if self.serial.bytes_to_read()? == 0 {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        match self.serial.read(&mut byte) {
            Ok(1) => Ok(Some(byte[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut remaining = bytes;
        while !remaining.is_empty() {
            match self.serial.write(remaining) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => remaining = &remaining[n..],
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) =>
                {
                    log::trace!("Transmit buffer full, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
