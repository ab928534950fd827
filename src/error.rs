// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the application
//!
//! `DdcError` describes what can go wrong on the wire for a single
//! transaction. `AppError` wraps it with the display and command the
//! failing operation was acting on.

use thiserror::Error;

use crate::command::Command;

/// Outcome of a single DDC/CI transaction that did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DdcError {
    /// Every attempt of the retry budget failed
    #[error("DDC/CI transaction for opcode {opcode:#04x} failed after {attempts} attempt(s)")]
    TransportFailed { opcode: u8, attempts: u16 },

    /// The display does not implement this VCP code on this hardware path
    #[error("VCP code {opcode:#04x} is not supported by the display")]
    Unsupported { opcode: u8 },

    /// Reply checksum did not validate (one attempt only, folds into `TransportFailed`)
    #[error("reply checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The underlying bus reported an I/O error
    #[error("bus error: {0}")]
    Bus(String),
}

impl DdcError {
    /// Capability mismatches are never retried and should disable the control
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DdcError::Unsupported { .. })
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// DDC/CI communication error
    #[error("DDC/CI error on display {id} ({command:?}): {source}")]
    Ddc {
        id: String,
        command: Command,
        #[source]
        source: DdcError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Display not found in manager
    #[error("Display {0} not found")]
    DisplayNotFound(String),

    /// The worker owning a display has stopped
    #[error("Worker for display {0} is gone")]
    WorkerGone(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl AppError {
    /// Whether the failure came from the display lacking the command
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AppError::Ddc { source, .. } if source.is_unsupported())
    }
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;
