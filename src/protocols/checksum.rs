// SPDX-License-Identifier: GPL-3.0-only
//! Running XOR checksum used by DDC/CI frames

/// XOR `initial` with every byte of `bytes[start..end]`, in order
pub fn checksum(initial: u8, bytes: &[u8], start: usize, end: usize) -> u8 {
    bytes[start..end].iter().fold(initial, |acc, b| acc ^ b)
}
