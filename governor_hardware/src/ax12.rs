//! Dynamixel Protocol 1.0 client for the AX-12 class of servos.
//!
//! Wire format, both directions:
//! `0xFF 0xFF <id> <len> <instr-or-error> <params...> <checksum>`
//! where `len` counts the params plus two and the checksum is the
//! bitwise inverse of the byte sum from `<id>` through the last param.

use std::time::{Duration, Instant};

use governor_traits::Servo;

use crate::error::{BusError, Result};
use crate::link::BusLink;

/// Control-table addresses used by the governor.
pub const ADDR_TORQUE_ENABLE: u8 = 24;
pub const ADDR_GOAL_POSITION: u8 = 30;
pub const ADDR_PRESENT_POSITION: u8 = 36;

const INSTR_PING: u8 = 0x01;
const INSTR_READ: u8 = 0x02;
const INSTR_WRITE: u8 = 0x03;

/// Checksum over everything between the header and the checksum byte
/// itself: id, length, instruction (or error), params.
#[must_use]
pub fn checksum(body: &[u8]) -> u8 {
    let sum: u32 = body.iter().map(|&b| u32::from(b)).sum();
    !(sum as u8)
}

/// Serialize one instruction packet.
#[must_use]
pub fn instruction_packet(id: u8, instruction: u8, params: &[u8]) -> Vec<u8> {
    let len = params.len() as u8 + 2;
    let mut packet = Vec::with_capacity(params.len() + 6);
    packet.extend_from_slice(&[0xFF, 0xFF, id, len, instruction]);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

struct StatusPacket {
    id: u8,
    error: u8,
    params: Vec<u8>,
}

/// One servo on a half-duplex Protocol 1.0 bus.
///
/// Every register access is a full round trip: discard stale input,
/// send the instruction, then hunt for the status packet under a
/// single deadline. Device-reported errors surface as
/// [`BusError::DeviceError`] with the raw status byte.
pub struct Ax12Client<L: BusLink> {
    link: L,
    id: u8,
    timeout: Duration,
}

impl<L: BusLink> Ax12Client<L> {
    pub fn new(link: L, id: u8, timeout: Duration) -> Self {
        Self { link, id, timeout }
    }

    /// Borrow the underlying transport, e.g. for diagnostics.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Verify the device answers at all.
    pub fn ping(&mut self) -> Result<()> {
        self.transact(INSTR_PING, &[], 0)?;
        Ok(())
    }

    /// Write one byte to a control-table register.
    pub fn write_u8(&mut self, addr: u8, value: u8) -> Result<()> {
        self.transact(INSTR_WRITE, &[addr, value], 0)?;
        Ok(())
    }

    /// Write a 16-bit register, low byte first.
    pub fn write_u16(&mut self, addr: u8, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.transact(INSTR_WRITE, &[addr, lo, hi], 0)?;
        Ok(())
    }

    /// Read a 16-bit register, low byte first.
    pub fn read_u16(&mut self, addr: u8) -> Result<u16> {
        let params = self.transact(INSTR_READ, &[addr, 2], 2)?;
        Ok(u16::from_le_bytes([params[0], params[1]]))
    }

    fn transact(&mut self, instruction: u8, params: &[u8], expect: usize) -> Result<Vec<u8>> {
        self.link.discard_input()?;
        let packet = instruction_packet(self.id, instruction, params);
        tracing::trace!(id = self.id, instruction, ?params, "bus tx");
        self.link.send(&packet)?;

        let deadline = Instant::now() + self.timeout;
        let status = self.read_status(deadline)?;
        if status.id != self.id {
            return Err(BusError::CommFailure(format!(
                "status from id {} while talking to id {}",
                status.id, self.id
            )));
        }
        if status.error != 0 {
            return Err(BusError::DeviceError(status.error));
        }
        if status.params.len() != expect {
            return Err(BusError::CommFailure(format!(
                "status carried {} params, expected {expect}",
                status.params.len()
            )));
        }
        tracing::trace!(id = self.id, params = ?status.params, "bus rx");
        Ok(status.params)
    }

    fn read_status(&mut self, deadline: Instant) -> Result<StatusPacket> {
        self.seek_header(deadline)?;

        let mut head = [0u8; 3];
        self.read_exact(&mut head, deadline)?;
        let [id, len, error] = head;
        if len < 2 {
            return Err(BusError::CommFailure(format!(
                "status length field {len} below minimum"
            )));
        }

        let mut params = vec![0u8; usize::from(len) - 2];
        self.read_exact(&mut params, deadline)?;

        let mut sum = [0u8; 1];
        self.read_exact(&mut sum, deadline)?;

        let mut body = Vec::with_capacity(params.len() + 3);
        body.extend_from_slice(&[id, len, error]);
        body.extend_from_slice(&params);
        if sum[0] != checksum(&body) {
            return Err(BusError::CommFailure("status checksum mismatch".into()));
        }

        Ok(StatusPacket { id, error, params })
    }

    /// Scan forward to the next `0xFF 0xFF` header, tolerating line noise.
    fn seek_header(&mut self, deadline: Instant) -> Result<()> {
        let mut run = 0u8;
        loop {
            let mut byte = [0u8; 1];
            self.read_exact(&mut byte, deadline)?;
            run = if byte[0] == 0xFF {
                run.saturating_add(1)
            } else {
                0
            };
            if run >= 2 {
                return Ok(());
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8], deadline: Instant) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                return Err(BusError::Timeout);
            }
            let n = self.link.recv(&mut buf[filled..], deadline - now)?;
            if n == 0 {
                return Err(BusError::Timeout);
            }
            filled += n;
        }
        Ok(())
    }
}

impl<L: BusLink> Servo for Ax12Client<L> {
    fn set_torque(
        &mut self,
        enabled: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write_u8(ADDR_TORQUE_ENABLE, u8::from(enabled))
            .map_err(Into::into)
    }

    fn write_goal_position(
        &mut self,
        position: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write_u16(ADDR_GOAL_POSITION, position)
            .map_err(Into::into)
    }

    fn read_present_position(
        &mut self,
    ) -> std::result::Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        self.read_u16(ADDR_PRESENT_POSITION).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_inverts_byte_sum() {
        // id 0, len 5, write, goal position 512 little-endian
        assert_eq!(checksum(&[0x00, 0x05, 0x03, 0x1E, 0x00, 0x02]), 0xD7);
        // zero body sums to zero, checksum is all ones
        assert_eq!(checksum(&[]), 0xFF);
        // sums wrap at a byte boundary before inversion
        assert_eq!(checksum(&[0xFF, 0x02]), !(0x01u8));
    }

    #[test]
    fn write_packet_layout_matches_wire_format() {
        let packet = instruction_packet(0, INSTR_WRITE, &[ADDR_GOAL_POSITION, 0x00, 0x02]);
        assert_eq!(packet, vec![0xFF, 0xFF, 0x00, 0x05, 0x03, 0x1E, 0x00, 0x02, 0xD7]);
    }

    #[test]
    fn read_packet_layout_matches_wire_format() {
        let packet = instruction_packet(0, INSTR_READ, &[ADDR_PRESENT_POSITION, 2]);
        assert_eq!(packet, vec![0xFF, 0xFF, 0x00, 0x04, 0x02, 0x24, 0x02, 0xD3]);
    }

    #[test]
    fn ping_packet_has_no_params() {
        let packet = instruction_packet(0, INSTR_PING, &[]);
        assert_eq!(packet, vec![0xFF, 0xFF, 0x00, 0x02, 0x01, 0xFC]);
    }
}
