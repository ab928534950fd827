// SPDX-License-Identifier: GPL-3.0-only
//! Control session: one user action against one display
//!
//! A session reads the persisted state, computes the new raw value with the
//! [`Quantizer`], writes it through the display's transport and only then
//! persists it and tells the OSD. A failed write aborts the action: later
//! dependent writes, persistence and the OSD are skipped.

use crate::command::{Command, MUTE_OFF, MUTE_ON, OSD_DISABLED};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::monitor::{DisplayHandle, DisplayId};
use crate::protocols::{Diagnostic, Transport};
use crate::quantize::{Direction, Quantizer};
use crate::store::{PollingMode, ValueStore};

/// Times the OSD-disable command is sent; monitors often ignore the first ones
const OSD_HIDE_REPEATS: u16 = 20;

/// Receives the values the host should draw on its own OSD
pub trait OsdSink {
    fn show_osd(&mut self, command: Command, value: u16, max: u16, round_chiclet: bool);
}

/// Audible confirmation of volume changes
pub trait AudioFeedback {
    fn is_system_feedback_enabled(&self) -> bool;
    fn play_feedback_cue(&self);
}

/// Never plays anything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFeedback;

impl AudioFeedback for NoFeedback {
    fn is_system_feedback_enabled(&self) -> bool {
        false
    }

    fn play_feedback_cue(&self) {}
}

/// Per-display settings a session needs, resolved from [`Config`]
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub quantizer: Quantizer,
    pub max_ceiling: u16,
    pub contrast_follows_brightness: bool,
    pub hide_osd: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), "")
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config, id: &str) -> Self {
        Self {
            quantizer: Quantizer::new(config.chiclet_count),
            max_ceiling: config.max_ceiling,
            contrast_follows_brightness: config.contrast_follows_brightness,
            hide_osd: config.hide_osd(id),
        }
    }
}

pub struct ControlSession<'a, S: ValueStore + ?Sized> {
    display: &'a mut DisplayHandle,
    store: &'a mut S,
    osd: &'a mut dyn OsdSink,
    feedback: &'a dyn AudioFeedback,
    settings: &'a SessionSettings,
}

impl<'a, S: ValueStore + ?Sized> ControlSession<'a, S> {
    pub fn new(
        display: &'a mut DisplayHandle,
        store: &'a mut S,
        osd: &'a mut dyn OsdSink,
        feedback: &'a dyn AudioFeedback,
        settings: &'a SessionSettings,
    ) -> Self {
        Self {
            display,
            store,
            osd,
            feedback,
            settings,
        }
    }

    fn id(&self) -> DisplayId {
        self.display.id().clone()
    }

    fn write(&mut self, command: Command, value: u16) -> Result<()> {
        self.display
            .backend_mut()
            .write(command.opcode(), value)
            .map_err(|source| {
                warn!(
                    display_id = %self.display.id(),
                    ?command,
                    value,
                    "write failed: {source}"
                );
                AppError::Ddc {
                    id: self.display.id().clone(),
                    command,
                    source,
                }
            })
    }

    fn play_cue(&self) {
        if self.feedback.is_system_feedback_enabled() {
            self.feedback.play_feedback_cue();
        }
    }

    /// The display implements a real mute register (its maximum is 2)
    pub fn supports_mute(&self) -> bool {
        self.store.get_max(self.display.id(), Command::AudioMuteScreenBlank) == 2
    }

    /// Read a register back from the display and persist it
    ///
    /// Uses the polling configuration of the register for the number of
    /// tries; a polling mode of `none` skips the read and returns the
    /// persisted value. The reported maximum is clamped to the ceiling. While
    /// muted, speaker volume only takes the new maximum.
    pub fn sync_from_hardware(&mut self, command: Command) -> Result<u16> {
        let id = self.id();
        let tries = self.store.polling_tries(&id, command);
        if tries == 0 {
            debug!(display_id = %id, ?command, "polling disabled, keeping persisted value");
            return Ok(self.store.get(&id, command));
        }

        let reading = self
            .display
            .backend_mut()
            .read(command.opcode(), tries)
            .map_err(|source| AppError::Ddc {
                id: id.clone(),
                command,
                source,
            })?;

        let ceiling = self.settings.max_ceiling;
        let max = match reading.maximum {
            0 => ceiling,
            reported => reported.min(ceiling),
        };
        self.store.set_max(&id, command, max);

        // Muting zeroes the hardware volume; the stored level is what unmute restores
        if command == Command::AudioSpeakerVolume
            && self.store.get(&id, Command::AudioMuteScreenBlank) == MUTE_ON
        {
            let current = self.store.get(&id, command);
            debug!(display_id = %id, current, max, "muted, keeping stored volume");
            return Ok(current);
        }

        let current = reading.current.min(max);
        self.store.set(&id, command, current);
        debug!(display_id = %id, ?command, current, max, "synced from hardware");
        Ok(current)
    }

    /// Write an absolute value (clamped to the register's max)
    pub fn set_value(&mut self, command: Command, value: u16) -> Result<()> {
        let id = self.id();
        let max = self.store.get_max(&id, command);
        let value = value.min(max);

        self.write(command, value)?;
        self.store.set(&id, command, value);
        self.osd.show_osd(command, value, max, false);
        Ok(())
    }

    pub fn set_polling(&mut self, command: Command, mode: PollingMode, count: u16) {
        let id = self.id();
        self.store.set_polling_mode(&id, command, mode);
        self.store.set_polling_count(&id, command, count);
    }

    pub fn toggle_mute(&mut self) -> Result<()> {
        let id = self.id();
        let muted = self.store.get(&id, Command::AudioMuteScreenBlank) == MUTE_ON;
        let volume_max = self.store.get_max(&id, Command::AudioSpeakerVolume);

        let (mute_value, volume, restore_volume) = if !muted {
            (MUTE_ON, 0, false)
        } else {
            let volume = self.store.get(&id, Command::AudioSpeakerVolume);
            // Unmuting to silence would look like nothing happened
            if volume == 0 {
                (MUTE_OFF, self.settings.quantizer.step_size(volume_max), true)
            } else {
                (MUTE_OFF, volume, false)
            }
        };

        self.write(Command::AudioSpeakerVolume, volume)?;
        if self.supports_mute() {
            self.write(Command::AudioMuteScreenBlank, mute_value)?;
        }

        if restore_volume {
            self.store.set(&id, Command::AudioSpeakerVolume, volume);
        }
        self.store.set(&id, Command::AudioMuteScreenBlank, mute_value);

        let osd_command = if volume > 0 {
            Command::AudioSpeakerVolume
        } else {
            Command::AudioMuteScreenBlank
        };
        self.osd.show_osd(osd_command, volume, volume_max, true);

        if volume > 0 {
            self.play_cue();
        }
        Ok(())
    }

    pub fn step_volume(&mut self, direction: Direction, small_increment: bool) -> Result<()> {
        let id = self.id();
        let current = self.store.get(&id, Command::AudioSpeakerVolume);
        let max = self.store.get_max(&id, Command::AudioSpeakerVolume);
        let volume = self
            .settings
            .quantizer
            .calc_new_value(current, max, direction, small_increment);

        let muted = self.store.get(&id, Command::AudioMuteScreenBlank) == MUTE_ON;
        let mute_value = match (muted, volume) {
            (true, v) if v > 0 => Some(MUTE_OFF),
            (false, 0) => Some(MUTE_ON),
            _ => None,
        };

        let already_set = volume == current;
        if !already_set {
            self.write(Command::AudioSpeakerVolume, volume)?;
            self.store.set(&id, Command::AudioSpeakerVolume, volume);
        }

        if let Some(mute_value) = mute_value {
            if self.supports_mute() {
                self.write(Command::AudioMuteScreenBlank, mute_value)?;
            }
            self.store.set(&id, Command::AudioMuteScreenBlank, mute_value);
        }

        let osd_command = if volume > 0 {
            Command::AudioSpeakerVolume
        } else {
            Command::AudioMuteScreenBlank
        };
        self.osd.show_osd(osd_command, volume, max, !small_increment);

        if !already_set && volume > 0 {
            self.play_cue();
        }
        Ok(())
    }

    /// Step brightness, lowering contrast instead once brightness hits its floor
    ///
    /// Coupled mode is entered when a downward step leaves brightness
    /// unchanged and contrast-follows-brightness is enabled. The contrast at
    /// that moment becomes the restore target. While coupled every step goes
    /// to contrast; the mode ends when contrast reaches or passes the target,
    /// and contrast is clamped to it.
    pub fn step_brightness(&mut self, direction: Direction, small_increment: bool) -> Result<()> {
        if self.display.contrast_after_brightness {
            return self.step_coupled_contrast(direction, small_increment);
        }

        let id = self.id();
        let current = self.store.get(&id, Command::Brightness);
        let max = self.store.get_max(&id, Command::Brightness);
        let brightness = self
            .settings
            .quantizer
            .calc_new_value(current, max, direction, small_increment);

        if brightness == current {
            if direction == Direction::Down && self.settings.contrast_follows_brightness {
                let contrast = self.store.get(&id, Command::Contrast);
                self.store.set_restore(&id, Command::Contrast, contrast);
                self.display.contrast_after_brightness = true;
                info!(display_id = %id, restore = contrast, "brightness at floor, lowering contrast");
                return self.step_coupled_contrast(direction, small_increment);
            }

            self.osd.show_osd(Command::Brightness, brightness, max, !small_increment);
            return Ok(());
        }

        self.write(Command::Brightness, brightness)?;
        self.store.set(&id, Command::Brightness, brightness);
        self.osd.show_osd(Command::Brightness, brightness, max, !small_increment);
        Ok(())
    }

    fn step_coupled_contrast(&mut self, direction: Direction, small_increment: bool) -> Result<()> {
        let id = self.id();
        let current = self.store.get(&id, Command::Contrast);
        let max = self.store.get_max(&id, Command::Contrast);
        let restore = self.store.get_restore(&id, Command::Contrast);

        let mut contrast = self
            .settings
            .quantizer
            .calc_new_value(current, max, direction, small_increment);
        let reached_target = contrast >= restore;
        if reached_target {
            contrast = restore;
        }

        if contrast != current {
            self.write(Command::Contrast, contrast)?;
            self.store.set(&id, Command::Contrast, contrast);
        }

        if reached_target {
            self.display.contrast_after_brightness = false;
            info!(display_id = %id, contrast, "contrast restored, leaving coupled mode");
        }

        self.osd.show_osd(Command::Contrast, contrast, max, !small_increment);
        Ok(())
    }

    /// Disable the monitor's own OSD if the display is configured for it
    ///
    /// Best effort: the command is sent repeatedly and failures are ignored.
    pub fn hide_display_osd(&mut self) -> Diagnostic {
        let mut diagnostic = Diagnostic::default();
        if !self.settings.hide_osd {
            return diagnostic;
        }

        for _ in 0..OSD_HIDE_REPEATS {
            let ok = self
                .display
                .backend_mut()
                .write(Command::Osd.opcode(), OSD_DISABLED)
                .is_ok();
            diagnostic.record(ok);
        }

        debug!(
            display_id = %self.display.id(),
            succeeded = diagnostic.succeeded,
            attempted = diagnostic.attempted,
            "sent OSD disable"
        );
        diagnostic
    }
}
