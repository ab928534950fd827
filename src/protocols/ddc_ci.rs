// SPDX-License-Identifier: GPL-3.0-only
//! VCP channel backed by `ddc-hi`
//!
//! `ddc-hi` does the DDC/CI framing itself, so displays it enumerates are
//! driven through the direct transport.

use std::time::Duration;

use ddc_hi::{Ddc, Display};

use crate::command::Command;

use super::direct::VcpChannel;

/// DDC/CI display found by `ddc-hi`
pub struct DdcHiChannel {
    display: Display,
}

impl DdcHiChannel {
    pub fn new(display: Display) -> Self {
        Self { display }
    }

    /// Enumerate all DDC/CI displays
    pub fn enumerate() -> Vec<Self> {
        Display::enumerate().into_iter().map(Self::new).collect()
    }

    pub fn id(&self) -> String {
        self.display.info.id.clone()
    }

    pub fn name(&self) -> String {
        self.display
            .info
            .model_name
            .clone()
            .unwrap_or_default()
    }
}

impl VcpChannel for DdcHiChannel {
    fn write_vcp(&mut self, opcode: u8, value: u16) -> bool {
        match self.display.handle.set_vcp_feature(opcode, value) {
            Ok(()) => true,
            Err(e) => {
                debug!(opcode, "set_vcp_feature failed: {e}");
                false
            }
        }
    }

    fn read_vcp(&mut self, opcode: u8, tries: u16, min_reply_delay: Duration) -> Option<(u16, u16)> {
        let tries = tries.max(1);
        for attempt in 1..=tries {
            match self.display.handle.get_vcp_feature(opcode) {
                Ok(value) => return Some((value.value(), value.maximum())),
                Err(e) => {
                    debug!(opcode, attempt, "get_vcp_feature failed: {e}");
                    if attempt < tries {
                        std::thread::sleep(min_reply_delay);
                    }
                }
            }
        }
        None
    }

    fn supports_ddc(&mut self) -> bool {
        self.display
            .handle
            .get_vcp_feature(Command::VcpVersion.opcode())
            .is_ok()
    }

    fn enable_app_report(&mut self) -> bool {
        self.display
            .handle
            .set_vcp_feature(Command::EnableAppReport.opcode(), 1)
            .is_ok()
    }
}

impl std::fmt::Debug for DdcHiChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DdcHiChannel(id: {}, name: {})", self.id(), self.name())
    }
}
