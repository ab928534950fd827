// SPDX-License-Identifier: GPL-3.0-only
//! VCP (Virtual Control Panel) commands understood by the engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Value written to `AudioMuteScreenBlank` to mute the speakers
pub const MUTE_ON: u16 = 1;
/// Value written to `AudioMuteScreenBlank` to unmute the speakers
pub const MUTE_OFF: u16 = 2;
/// Value written to `Osd` to disable the monitor's own on-screen display
pub const OSD_DISABLED: u16 = 1;

/// A hardware register identifier with a fixed wire opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Brightness,
    Contrast,
    InputSelect,
    AudioSpeakerVolume,
    AudioMuteScreenBlank,
    Osd,
    PowerMode,
    VcpVersion,
    EnableAppReport,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Brightness,
        Command::Contrast,
        Command::InputSelect,
        Command::AudioSpeakerVolume,
        Command::AudioMuteScreenBlank,
        Command::Osd,
        Command::PowerMode,
        Command::VcpVersion,
        Command::EnableAppReport,
    ];

    /// The MCCS opcode byte sent on the wire
    pub fn opcode(self) -> u8 {
        match self {
            Command::Brightness => 0x10,
            Command::Contrast => 0x12,
            Command::InputSelect => 0x60,
            Command::AudioSpeakerVolume => 0x62,
            Command::AudioMuteScreenBlank => 0x8D,
            Command::Osd => 0xCA,
            Command::PowerMode => 0xD6,
            Command::VcpVersion => 0xDF,
            Command::EnableAppReport => 0xF5,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.opcode() == opcode)
    }

    /// Name used in the values file and on the command line
    pub fn name(self) -> &'static str {
        match self {
            Command::Brightness => "brightness",
            Command::Contrast => "contrast",
            Command::InputSelect => "input-select",
            Command::AudioSpeakerVolume => "audio-speaker-volume",
            Command::AudioMuteScreenBlank => "audio-mute-screen-blank",
            Command::Osd => "osd",
            Command::PowerMode => "power-mode",
            Command::VcpVersion => "vcp-version",
            Command::EnableAppReport => "enable-app-report",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if let Some(hex) = s.strip_prefix("0x") {
            return u8::from_str_radix(hex, 16)
                .ok()
                .and_then(Command::from_opcode)
                .ok_or_else(|| format!("unknown VCP opcode: {s}"));
        }
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown command: {s}"))
    }
}
