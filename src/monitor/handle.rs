// SPDX-License-Identifier: GPL-3.0-only
//! One registered physical monitor

use super::backend::{DisplayBackend, DisplayId};

/// A monitor and the transport it exclusively owns
///
/// Lives as long as the monitor is registered. Besides the transport it
/// carries the transient state of the control session, which only
/// [`crate::control::ControlSession`] changes.
#[derive(Debug)]
pub struct DisplayHandle {
    id: DisplayId,
    name: String,
    backend: DisplayBackend,
    /// Contrast is being lowered because brightness is at its floor
    pub(crate) contrast_after_brightness: bool,
}

impl DisplayHandle {
    pub fn new(id: DisplayId, name: String, backend: DisplayBackend) -> Self {
        Self {
            id,
            name,
            backend,
            contrast_after_brightness: false,
        }
    }

    pub fn id(&self) -> &DisplayId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &DisplayBackend {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut DisplayBackend {
        &mut self.backend
    }

    pub fn is_contrast_after_brightness(&self) -> bool {
        self.contrast_after_brightness
    }
}
