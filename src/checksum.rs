//! Stream integrity digest.
//!
//! A multiply-add recurrence is folded over the un-framed symbol sequence,
//! one symbol at a time, and transmitted as a 7-digit base-94 trailer after
//! the final frame's payload. The modulus is below `94^7`, so the trailer
//! always fits; widening through `u128` keeps every step exact.

use crate::alphabet::SYMBOL_COUNT;
use crate::error::{Result, TabwireError};

/// Number of trailer symbols carrying the digest.
pub const TRAILER_LEN: usize = 7;

/// Modulus of the accumulator. Below `94^7 = 64_847_759_419_264`.
const MOD: u64 = 64_847_759_419_247;

/// Mixing multiplier.
const MUL: u64 = 2_147_483_629;

/// Rolling digest over a symbol sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamDigest {
    acc: u64,
}

impl StreamDigest {
    /// Creates a digest in its initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mixes one symbol into the accumulator.
    ///
    /// The symbol is offset by one so that leading zero symbols still
    /// perturb the state.
    pub fn update(&mut self, symbol: u8) {
        let widened = u128::from(self.acc) * u128::from(MUL) + u128::from(symbol) + 1;
        self.acc = (widened % u128::from(MOD)) as u64;
    }

    /// Mixes a run of symbols.
    pub fn update_all(&mut self, symbols: &[u8]) {
        for &s in symbols {
            self.update(s);
        }
    }

    /// Final accumulator value.
    pub fn value(&self) -> u64 {
        self.acc
    }

    /// Renders the accumulator as the 7-symbol base-94 trailer,
    /// most significant digit first.
    pub fn trailer(&self) -> [u8; TRAILER_LEN] {
        let mut out = [0u8; TRAILER_LEN];
        let mut acc = self.acc;
        for slot in out.iter_mut().rev() {
            *slot = (acc % u64::from(SYMBOL_COUNT)) as u8;
            acc /= u64::from(SYMBOL_COUNT);
        }
        out
    }

    /// Checks a received trailer against the accumulator.
    pub fn verify(&self, trailer: &[u8]) -> Result<()> {
        if trailer.len() != TRAILER_LEN {
            return Err(TabwireError::Transport(format!(
                "checksum trailer has {} symbols, expected {TRAILER_LEN}",
                trailer.len()
            )));
        }
        let mut received: u64 = 0;
        for &s in trailer {
            received = received * u64::from(SYMBOL_COUNT) + u64::from(s);
        }
        if received != self.acc {
            return Err(TabwireError::Integrity(format!(
                "checksum mismatch: received {received}, computed {}",
                self.acc
            )));
        }
        Ok(())
    }
}
