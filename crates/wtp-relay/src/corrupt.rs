//! Single-byte payload corruption.
//!
//! WTP packets start with a 16-byte header (type, seq, length, checksum).
//! Only bytes after it are touched, so a corrupted packet still frames
//! correctly and the receiver has to catch the damage through the checksum.

use std::ops::RangeInclusive;

use rand::{Rng, RngExt};

pub const HEADER_LEN: usize = 16;

/// Added (mod 256) to the chosen byte. Never zero, so the byte always changes.
pub const DELTA: RangeInclusive<u8> = 25..=50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corruption {
    pub index: usize,
    pub old: u8,
    pub new: u8,
}

/// With probability `probability`, change one byte past the header.
///
/// Payloads of `HEADER_LEN` bytes or less are never touched and consume no
/// randomness.
pub fn corrupt(payload: &mut [u8], probability: f64, rng: &mut impl Rng) -> Option<Corruption> {
    if payload.len() <= HEADER_LEN {
        return None;
    }
    if rng.random::<f64>() >= probability {
        return None;
    }

    let index = rng.random_range(HEADER_LEN..payload.len());
    let old = payload[index];
    let new = old.wrapping_add(rng.random_range(DELTA));
    payload[index] = new;

    Some(Corruption { index, old, new })
}
