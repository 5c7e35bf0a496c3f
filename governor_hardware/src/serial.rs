//! Serial transports for the real rig: a half-duplex bus adapter for the
//! servo and a line-buffered reader for the telemetry feed.

use std::io::{Read, Write};
use std::time::Duration;

use governor_traits::TelemetrySource;

use crate::error::{BusError, Result};
use crate::link::BusLink;

// Open with a short base timeout; per-call deadlines override it.
const OPEN_TIMEOUT: Duration = Duration::from_millis(10);

// Cap on buffered telemetry bytes while hunting for a newline.
const MAX_PENDING: usize = 8 * 1024;

impl From<serialport::Error> for BusError {
    fn from(e: serialport::Error) -> Self {
        BusError::CommFailure(e.to_string())
    }
}

/// Byte transport over the servo bus serial adapter.
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud).timeout(OPEN_TIMEOUT).open()?;
        tracing::info!(path, baud, "servo bus open");
        Ok(Self { port })
    }
}

impl BusLink for SerialLink {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

/// Non-blocking line reader over the telemetry serial feed.
pub struct SerialTelemetry {
    port: Box<dyn serialport::SerialPort>,
    buf: Vec<u8>,
}

impl SerialTelemetry {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud).timeout(OPEN_TIMEOUT).open()?;
        tracing::info!(path, baud, "telemetry feed open");
        Ok(Self {
            port,
            buf: Vec::new(),
        })
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

impl TelemetrySource for SerialTelemetry {
    fn poll_line(
        &mut self,
    ) -> std::result::Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending > 0 {
            let mut chunk = vec![0u8; pending.min(4096)];
            match self.port.read(&mut chunk) {
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(Box::new(e)),
            }
        }
        // A source that never terminates its lines must not grow the
        // buffer without bound; shed the oldest bytes.
        if self.buf.len() > MAX_PENDING {
            let excess = self.buf.len() - MAX_PENDING;
            self.buf.drain(..excess);
            tracing::warn!(dropped = excess, "telemetry buffer overrun");
        }
        Ok(self.take_line())
    }
}
