use std::time::Duration;

use crate::error::Result;

/// Raw byte transport under the servo bus protocol.
///
/// Implemented by the serial half-duplex adapter in production and by
/// scripted fakes in tests. The protocol client layers packet framing
/// on top and owns all retry/timeout policy beyond a single `recv`.
pub trait BusLink {
    /// Write the whole buffer to the wire.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when the timeout elapsed with nothing received.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Drop any unread input, e.g. stale status bytes from an earlier
    /// exchange that was abandoned mid-packet.
    fn discard_input(&mut self) -> Result<()>;
}
