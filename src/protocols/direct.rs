// SPDX-License-Identifier: GPL-3.0-only
//! DDC/CI through a higher level VCP read/write channel
//!
//! Framing, checksums and reply timing are handled by the channel. This
//! transport only adds the write repetition some monitors need before they
//! acknowledge a change reliably.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DdcError;

use super::{Diagnostic, Transport, VcpReading};

/// Primitive VCP access supplied by a platform DDC library
pub trait VcpChannel: Send {
    /// Set a VCP feature, `true` when the library reported success
    fn write_vcp(&mut self, opcode: u8, value: u16) -> bool;

    /// Read `(current, max)`, trying up to `tries` times with `min_reply_delay`
    /// between tries. `None` when the display never answered.
    fn read_vcp(&mut self, opcode: u8, tries: u16, min_reply_delay: Duration) -> Option<(u16, u16)>;

    /// Whether the display answers DDC/CI at all
    fn supports_ddc(&mut self) -> bool;

    /// Ask the display to enable application reports
    fn enable_app_report(&mut self) -> bool;
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct DirectSettings {
    /// How many times each write is issued; the last result counts
    pub write_repeat: u8,
    /// Minimum delay between read tries, in milliseconds
    pub min_reply_delay_ms: u64,
}

impl Default for DirectSettings {
    fn default() -> Self {
        Self {
            write_repeat: 2,
            min_reply_delay_ms: 50,
        }
    }
}

pub struct DirectTransport {
    channel: Box<dyn VcpChannel>,
    settings: DirectSettings,
}

impl DirectTransport {
    pub fn new(channel: Box<dyn VcpChannel>, settings: DirectSettings) -> Self {
        Self { channel, settings }
    }

    /// Query the protocol-support and report-enable capabilities
    ///
    /// Only logged; a failed probe never prevents the read that follows.
    pub fn probe_capabilities(&mut self) -> Diagnostic {
        let mut diagnostic = Diagnostic::default();
        diagnostic.record(self.channel.supports_ddc());
        diagnostic.record(self.channel.enable_app_report());
        diagnostic
    }
}

impl Transport for DirectTransport {
    fn write(&mut self, opcode: u8, value: u16) -> Result<(), DdcError> {
        let repeat = self.settings.write_repeat.max(1);
        let mut ok = false;
        for _ in 0..repeat {
            ok = self.channel.write_vcp(opcode, value);
        }

        if ok {
            Ok(())
        } else {
            Err(DdcError::TransportFailed {
                opcode,
                attempts: u16::from(repeat),
            })
        }
    }

    fn read(&mut self, opcode: u8, tries: u16) -> Result<VcpReading, DdcError> {
        let diagnostic = self.probe_capabilities();
        debug!(
            opcode,
            probes_ok = diagnostic.succeeded,
            "capability probes before read"
        );

        let delay = Duration::from_millis(self.settings.min_reply_delay_ms);
        match self.channel.read_vcp(opcode, tries, delay) {
            Some((current, maximum)) => Ok(VcpReading { current, maximum }),
            None => Err(DdcError::Unsupported { opcode }),
        }
    }
}

impl std::fmt::Debug for DirectTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DirectTransport(settings: {:?})", self.settings)
    }
}
