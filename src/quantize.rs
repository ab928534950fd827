// SPDX-License-Identifier: GPL-3.0-only
//! Conversion between raw register values and OSD chiclets
//!
//! The OSD draws `[0, max]` as a fixed number of equal steps ("chiclets").
//! Full steps move to the next whole chiclet, with hysteresis so that a value
//! sitting just past a boundary still visibly moves and a value sitting just
//! short of one does not move twice.

/// Chiclets drawn by the OSD
pub const DEFAULT_CHICLET_COUNT: u16 = 16;

/// Fraction of a chiclet treated as "on the boundary"
const DISTANCE_THRESHOLD: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Maps raw values to chiclet positions and computes step targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quantizer {
    chiclet_count: u16,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new(DEFAULT_CHICLET_COUNT)
    }
}

impl Quantizer {
    pub fn new(chiclet_count: u16) -> Self {
        Self {
            chiclet_count: chiclet_count.max(1),
        }
    }

    pub fn chiclet_count(&self) -> u16 {
        self.chiclet_count
    }

    /// Fractional chiclet position of `value` in `[0, max]`
    pub fn chiclet_from_value(&self, value: u16, max: u16) -> f64 {
        if max == 0 {
            return 0.0;
        }
        f64::from(value) / f64::from(max) * f64::from(self.chiclet_count)
    }

    /// Raw value (unrounded) at chiclet position `chiclet`
    pub fn value_from_chiclet(&self, chiclet: f64, max: u16) -> f64 {
        chiclet / f64::from(self.chiclet_count) * f64::from(max)
    }

    /// How far `chiclet` sits past the last whole chiclet
    pub fn distance_from_nearest_chiclet(chiclet: f64) -> f64 {
        (chiclet - chiclet.trunc()).abs()
    }

    /// Raw value of one chiclet, never less than one unit
    pub fn step_size(&self, max: u16) -> u16 {
        let step = self.value_from_chiclet(1.0, max).round() as u16;
        step.clamp(1, max.max(1))
    }

    /// Value after one step from `current`
    ///
    /// Small increments move one raw unit. Full steps move to the next whole
    /// chiclet in the direction of travel:
    ///
    /// * exactly on a chiclet: one more chiclet
    /// * going down, less than a quarter past a chiclet: one more chiclet down
    /// * going up, more than three quarters past a chiclet: one more chiclet up
    ///
    /// The result is rounded and clamped to `[0, max]`.
    pub fn calc_new_value(
        &self,
        current: u16,
        max: u16,
        direction: Direction,
        small_increment: bool,
    ) -> u16 {
        let current = current.min(max);

        let next = if small_increment {
            match direction {
                Direction::Up => f64::from(current) + 1.0,
                Direction::Down => f64::from(current) - 1.0,
            }
        } else {
            let position = self.chiclet_from_value(current, max);
            let distance = Self::distance_from_nearest_chiclet(position);

            let mut target = match direction {
                Direction::Up => position.ceil(),
                Direction::Down => position.floor(),
            };

            if distance == 0.0 {
                target += match direction {
                    Direction::Up => 1.0,
                    Direction::Down => -1.0,
                };
            } else if direction == Direction::Down && distance < DISTANCE_THRESHOLD {
                target -= 1.0;
            } else if direction == Direction::Up && distance > 1.0 - DISTANCE_THRESHOLD {
                target += 1.0;
            }

            self.value_from_chiclet(target, max).round()
        };

        next.clamp(0.0, f64::from(max)) as u16
    }
}
