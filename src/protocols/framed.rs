// SPDX-License-Identifier: GPL-3.0-only
//! Checksum-framed DDC/CI transport over a raw I2C bus
//!
//! Outgoing frame layout:
//!
//! ```text
//! [0x80 | (len + 1), len, send..., checksum]
//! ```
//!
//! A one-byte payload (`[opcode]`) is a Get VCP request, a three-byte payload
//! (`[opcode, value_hi, value_lo]`) is a Set VCP request. Get VCP replies are
//! 11 bytes long and end with a checksum seeded with `0x50`.

use std::time::Duration;

use crate::error::DdcError;

use super::checksum::checksum;
use super::retry::{Phase, RetryPolicy};
use super::{Transport, VcpReading};

/// Sub-address the host writes to and reads from on the DDC/CI slave
pub const DDC_DATA_ADDRESS: u8 = 0x51;

/// Checksum seed for outgoing frames
const WRITE_CHECKSUM_SEED: u8 = 0x6E;
/// Checksum seed for replies
const REPLY_CHECKSUM_SEED: u8 = 0x50;
/// Length of a Get VCP reply, checksum included
const GET_VCP_REPLY_LEN: usize = 11;

/// Raw access to the display's DDC/CI slave
pub trait I2cBus: Send {
    fn write(&mut self, data_address: u8, bytes: &[u8]) -> std::io::Result<()>;
    fn read(&mut self, data_address: u8, buf: &mut [u8]) -> std::io::Result<()>;
}

/// Build an outgoing frame for `send`, checksum included
pub fn build_frame(send: &[u8]) -> Vec<u8> {
    let len = send.len() as u8;
    let mut packet = Vec::with_capacity(send.len() + 3);
    packet.push(0x80 | (len + 1));
    packet.push(len);
    packet.extend_from_slice(send);
    packet.push(0);

    let seed = if send.len() == 1 {
        WRITE_CHECKSUM_SEED ^ DDC_DATA_ADDRESS
    } else {
        WRITE_CHECKSUM_SEED
    };
    let last = packet.len() - 1;
    packet[last] = checksum(seed, &packet, 0, last);
    packet
}

/// Check the trailing checksum byte of a reply
pub fn validate_reply(reply: &[u8]) -> Result<(), DdcError> {
    let Some(&actual) = reply.last() else {
        return Err(DdcError::Bus("empty reply".to_string()));
    };
    let expected = checksum(REPLY_CHECKSUM_SEED, reply, 0, reply.len() - 1);
    if expected == actual {
        Ok(())
    } else {
        Err(DdcError::ChecksumMismatch { expected, actual })
    }
}

/// DDC/CI over a raw bus with the framing and timing done here
pub struct FramedTransport {
    bus: Box<dyn I2cBus>,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl FramedTransport {
    pub fn new(bus: Box<dyn I2cBus>, policy: RetryPolicy) -> Self {
        Self {
            bus,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the blocking sleep (tests record the timing instead)
    #[cfg(test)]
    pub(crate) fn with_sleeper(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Ask the display for its VCP version; used to decide whether this path works
    pub fn probe(&mut self) -> bool {
        match self.read(crate::command::Command::VcpVersion.opcode(), 1) {
            Ok(reading) => {
                debug!("framed probe answered, MCCS version {:#06x}", reading.maximum);
                true
            }
            Err(e) => {
                debug!("framed probe failed: {e}");
                false
            }
        }
    }

    /// Send `send` and, when `reply` is not empty, read and validate a reply into it
    fn communicate(
        &mut self,
        opcode: u8,
        send: &[u8],
        reply: &mut [u8],
        attempts: u16,
    ) -> Result<(), DdcError> {
        let packet = build_frame(send);
        let expects_reply = !reply.is_empty();
        let bus = &mut self.bus;

        self.policy
            .execute(opcode, attempts, expects_reply, self.sleep, |phase| match phase {
                Phase::Write => bus
                    .write(DDC_DATA_ADDRESS, &packet)
                    .map_err(|e| DdcError::Bus(e.to_string())),
                Phase::Read => {
                    bus.read(DDC_DATA_ADDRESS, reply)
                        .map_err(|e| DdcError::Bus(e.to_string()))?;
                    validate_reply(reply)
                }
            })
    }
}

impl Transport for FramedTransport {
    fn write(&mut self, opcode: u8, value: u16) -> Result<(), DdcError> {
        let [hi, lo] = value.to_be_bytes();
        let attempts = u16::from(self.policy.num_retry_attempts);
        self.communicate(opcode, &[opcode, hi, lo], &mut [], attempts)
    }

    fn read(&mut self, opcode: u8, tries: u16) -> Result<VcpReading, DdcError> {
        let mut reply = [0u8; GET_VCP_REPLY_LEN];
        self.communicate(opcode, &[opcode], &mut reply, tries)?;

        // Byte 3 is the DDC/CI result code, non-zero means unsupported VCP code
        if reply[3] != 0 {
            return Err(DdcError::Unsupported { opcode });
        }

        Ok(VcpReading {
            maximum: u16::from_be_bytes([reply[6], reply[7]]),
            current: u16::from_be_bytes([reply[8], reply[9]]),
        })
    }
}

impl std::fmt::Debug for FramedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FramedTransport(policy: {:?})", self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, MockBus, get_vcp_reply, record_sleep, take_events};

    fn transport(bus: MockBus) -> FramedTransport {
        FramedTransport::new(Box::new(bus), RetryPolicy::default()).with_sleeper(record_sleep)
    }

    #[test]
    fn test_single_byte_payload_uses_combined_seed() {
        let frame = build_frame(&[0x10]);
        assert_eq!(frame[..3], [0x82, 0x01, 0x10]);
        assert_eq!(frame[3], 0x6E ^ 0x51 ^ 0x82 ^ 0x01 ^ 0x10);
        assert_ne!(frame[3], 0x6E ^ 0x82 ^ 0x01 ^ 0x10);
    }

    #[test]
    fn test_set_vcp_frame() {
        let frame = build_frame(&[0x10, 0x00, 0x32]);
        assert_eq!(frame[..5], [0x84, 0x03, 0x10, 0x00, 0x32]);
        assert_eq!(frame[5], 0x6E ^ 0x84 ^ 0x03 ^ 0x10 ^ 0x00 ^ 0x32);
    }

    #[test]
    fn test_validate_reply() {
        let reply = get_vcp_reply(0x10, 0, 100, 40);
        assert!(validate_reply(&reply).is_ok());

        let mut corrupted = reply;
        corrupted[9] ^= 0x01;
        assert!(matches!(
            validate_reply(&corrupted),
            Err(DdcError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_write_timing() {
        take_events();
        let bus = MockBus::default();
        let mut transport = transport(bus.clone());

        assert!(transport.write(0x62, 44).is_ok());

        let frame = build_frame(&[0x62, 0x00, 44]);
        assert_eq!(
            take_events(),
            vec![
                Event::Sleep(Duration::from_millis(10)),
                Event::Write(frame.clone()),
                Event::Sleep(Duration::from_millis(10)),
                Event::Write(frame),
            ]
        );
    }

    #[test]
    fn test_write_tolerates_one_failed_cycle() {
        take_events();
        let bus = MockBus::default();
        bus.fail_next_writes(1);
        let mut transport = transport(bus.clone());

        assert!(transport.write(0x10, 50).is_ok());
        assert_eq!(bus.write_count(), 2);
    }

    #[test]
    fn test_write_fails_when_every_cycle_fails() {
        take_events();
        let bus = MockBus::default();
        bus.fail_next_writes(usize::MAX);
        let mut transport = transport(bus.clone());

        assert_eq!(
            transport.write(0x10, 50),
            Err(DdcError::TransportFailed { opcode: 0x10, attempts: 3 })
        );
        assert_eq!(bus.write_count(), 6);
    }

    #[test]
    fn test_read_parses_reply() {
        take_events();
        let bus = MockBus::default();
        bus.push_reply(get_vcp_reply(0x10, 0, 100, 40).to_vec());
        let mut transport = transport(bus.clone());

        let reading = transport.read(0x10, 3).unwrap();
        assert_eq!(reading, VcpReading { current: 40, maximum: 100 });

        let events = take_events();
        assert_eq!(events[4], Event::Sleep(Duration::from_millis(10)));
        assert_eq!(events[5], Event::Read);
    }

    #[test]
    fn test_read_retries_on_checksum_mismatch() {
        take_events();
        let bus = MockBus::default();
        let mut bad = get_vcp_reply(0x12, 0, 100, 75);
        bad[10] ^= 0xFF;
        bus.push_reply(bad.to_vec());
        bus.push_reply(get_vcp_reply(0x12, 0, 100, 75).to_vec());
        let mut transport = transport(bus.clone());

        let reading = transport.read(0x12, 3).unwrap();
        assert_eq!(reading.current, 75);
        assert_eq!(bus.read_count(), 2);
        assert!(take_events().contains(&Event::Sleep(Duration::from_millis(20))));
    }

    #[test]
    fn test_read_fails_after_tries() {
        take_events();
        let bus = MockBus::default();
        let mut transport = transport(bus.clone());

        // No replies queued: every read returns an I/O error
        assert_eq!(
            transport.read(0x10, 5),
            Err(DdcError::TransportFailed { opcode: 0x10, attempts: 5 })
        );
        assert_eq!(bus.read_count(), 5);
    }

    #[test]
    fn test_unsupported_result_code() {
        take_events();
        let bus = MockBus::default();
        bus.push_reply(get_vcp_reply(0x8D, 1, 0, 0).to_vec());
        let mut transport = transport(bus.clone());

        assert_eq!(transport.read(0x8D, 3), Err(DdcError::Unsupported { opcode: 0x8D }));
        assert_eq!(bus.read_count(), 1);
    }
}
