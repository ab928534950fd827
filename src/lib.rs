// SPDX-License-Identifier: GPL-3.0-only
//! Monitor volume, mute and brightness control over DDC/CI
//!
//! The engine keeps a monitor's control registers in step with what the
//! user sees on a discrete on-screen indicator.

#[macro_use]
extern crate tracing;

pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod monitor;
pub mod protocols;
pub mod quantize;
pub mod store;

#[cfg(test)]
mod testing;
