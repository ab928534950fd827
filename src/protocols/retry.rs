// SPDX-License-Identifier: GPL-3.0-only
//! Write repetition, read delay and retry/backoff for framed transactions
//!
//! Monitors are timing sensitive, so the order of sleeps matters:
//!
//! ```text
//! attempt:
//!     repeat num_write_cycles: sleep(write_sleep); write   (any success is enough)
//!     if a reply is expected:  sleep(read_sleep);  read    (a bad reply fails the attempt)
//!     success -> return
//!     sleep(retry_sleep)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DdcError;

/// The two I/O steps of one attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Write,
    Read,
}

/// Timing of framed transactions, in microseconds
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub write_sleep_us: u64,
    pub num_write_cycles: u8,
    pub read_sleep_us: u64,
    pub num_retry_attempts: u8,
    pub retry_sleep_us: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            write_sleep_us: 10_000,
            num_write_cycles: 2,
            read_sleep_us: 10_000,
            num_retry_attempts: 3,
            retry_sleep_us: 20_000,
        }
    }
}

impl RetryPolicy {
    pub fn write_sleep(&self) -> Duration {
        Duration::from_micros(self.write_sleep_us)
    }

    pub fn read_sleep(&self) -> Duration {
        Duration::from_micros(self.read_sleep_us)
    }

    pub fn retry_sleep(&self) -> Duration {
        Duration::from_micros(self.retry_sleep_us)
    }

    /// Run one transaction under this policy
    ///
    /// `io` performs a single write or read. Write failures are tolerated as
    /// long as one write of the attempt succeeds; a failed read (bad checksum,
    /// bus error) fails the whole attempt. `Unsupported` is returned at once.
    ///
    /// # Arguments
    ///
    /// * `opcode` - Register the transaction is for (used in errors and logs)
    /// * `attempts` - Outer attempt budget (at least one attempt is made)
    /// * `expects_reply` - Whether to read a reply after the writes
    /// * `sleep` - Blocking sleep used between steps
    /// * `io` - Performs one step of the attempt
    pub fn execute<F>(
        &self,
        opcode: u8,
        attempts: u16,
        expects_reply: bool,
        sleep: fn(Duration),
        mut io: F,
    ) -> Result<(), DdcError>
    where
        F: FnMut(Phase) -> Result<(), DdcError>,
    {
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            let mut success = false;

            for _ in 0..self.num_write_cycles {
                sleep(self.write_sleep());
                match io(Phase::Write) {
                    Ok(()) => success = true,
                    Err(e) => debug!(opcode, attempt, "write failed: {e}"),
                }
            }

            if expects_reply {
                sleep(self.read_sleep());
                match io(Phase::Read) {
                    Ok(()) => success = true,
                    Err(e @ DdcError::Unsupported { .. }) => return Err(e),
                    Err(e) => {
                        debug!(opcode, attempt, "read failed: {e}");
                        success = false;
                    }
                }
            }

            if success {
                if attempt > 1 {
                    debug!(opcode, "transaction succeeded on attempt {attempt}");
                }
                return Ok(());
            }

            sleep(self.retry_sleep());
        }

        warn!(opcode, attempts, "DDC/CI transaction failed, retries exhausted");
        Err(DdcError::TransportFailed { opcode, attempts })
    }
}
