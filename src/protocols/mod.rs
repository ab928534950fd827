// SPDX-License-Identifier: GPL-3.0-only
//! DDC/CI transports
//!
//! A display is driven through exactly one transport, chosen when it is
//! registered:
//!
//! - [`framed::FramedTransport`] speaks raw checksum-framed DDC/CI over an
//!   I2C bus and owns the retry/backoff timing itself.
//! - [`direct::DirectTransport`] delegates to a higher level VCP channel
//!   (`ddc-hi` on this platform) that already handles framing.
//!
//! Both report the same tri-state outcome: `Ok`, `DdcError::TransportFailed`
//! or `DdcError::Unsupported`.

pub mod checksum;
pub mod ddc_ci;
pub mod direct;
pub mod framed;
#[cfg(target_os = "linux")]
pub mod i2c_dev;
pub mod retry;

use crate::error::DdcError;

/// Current and maximum value of a VCP register as reported by the display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VcpReading {
    pub current: u16,
    pub maximum: u16,
}

/// Common trait for all DDC/CI transports
pub trait Transport: std::fmt::Debug + Send {
    /// Write `value` to the register identified by `opcode`
    fn write(&mut self, opcode: u8, value: u16) -> Result<(), DdcError>;

    /// Read the register identified by `opcode`, trying up to `tries` times
    fn read(&mut self, opcode: u8, tries: u16) -> Result<VcpReading, DdcError>;
}

/// Tally of a best-effort operation
///
/// Returned by operations whose failures are deliberately ignored. It carries
/// no success/failure meaning for the caller and is only meant for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub attempted: u16,
    pub succeeded: u16,
}

impl Diagnostic {
    pub fn record(&mut self, ok: bool) {
        self.attempted += 1;
        if ok {
            self.succeeded += 1;
        }
    }
}
