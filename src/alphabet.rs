//! The 94-symbol transport alphabet and its byte mappings.
//!
//! Two fixed, invertible mappings live here:
//!
//! 1. Symbol ↔ wire byte. Symbols `0..=93` map onto the printable bytes
//!    `'!'..='~'` (0x21..=0x7E). Space, control bytes and the line terminator
//!    are transport-reserved and never appear in a frame payload.
//! 2. String byte ↔ symbol run unit. Bytes 0x20..=0x76 (the common text
//!    range) map to the single symbols `1..=87`; every other byte maps to a
//!    two-symbol unit `(88 + page, offset)`. Symbol `0` is the run
//!    terminator and is unreachable from any byte mapping.

use crate::error::{Result, TabwireError};

/// Number of symbols in the alphabet. Valid symbols are `0..SYMBOL_COUNT`.
pub const SYMBOL_COUNT: u8 = 94;

/// First wire byte of the symbol range (`'!'`).
pub const WIRE_BASE: u8 = b'!';

/// Last byte of the single-symbol string range (0x20..=0x76, 87 bytes).
const SINGLE_RANGE_LAST: u8 = 0x76;

/// First of the two page-prefix symbols used by two-symbol string units.
const PAGE_BASE: u8 = 88;

/// Count of byte values outside the single-symbol range.
const PAGED_BYTE_COUNT: u16 = 256 - 87;

/// Maps a symbol to its printable wire byte.
///
/// The caller guarantees `symbol < SYMBOL_COUNT`; encoders only ever produce
/// in-range symbols.
pub fn symbol_to_wire(symbol: u8) -> u8 {
    debug_assert!(symbol < SYMBOL_COUNT);
    WIRE_BASE + symbol
}

/// Maps a received wire byte back to a symbol.
///
/// Any byte outside `'!'..='~'` is a transport violation: the pending
/// transfer must be discarded.
pub fn wire_to_symbol(byte: u8) -> Result<u8> {
    if !(WIRE_BASE..WIRE_BASE + SYMBOL_COUNT).contains(&byte) {
        return Err(TabwireError::Transport(format!(
            "payload byte 0x{byte:02x} outside the symbol alphabet"
        )));
    }
    Ok(byte - WIRE_BASE)
}

/// Appends the symbol unit(s) for one string byte.
pub fn push_string_byte(byte: u8, out: &mut Vec<u8>) {
    if (0x20..=SINGLE_RANGE_LAST).contains(&byte) {
        out.push(1 + (byte - 0x20));
        return;
    }
    // Rank among the bytes not covered by the single-symbol range,
    // ascending: 0x00..=0x1F then 0x77..=0xFF.
    let rank: u16 = if byte < 0x20 {
        u16::from(byte)
    } else {
        32 + u16::from(byte - (SINGLE_RANGE_LAST + 1))
    };
    debug_assert!(rank < PAGED_BYTE_COUNT);
    let page = (rank / u16::from(SYMBOL_COUNT)) as u8;
    let offset = (rank % u16::from(SYMBOL_COUNT)) as u8;
    out.push(PAGE_BASE + page);
    out.push(offset);
}

/// Decodes one string unit starting at the first symbol after the STRING tag.
///
/// Returns `None` for the terminator, otherwise the decoded byte. `next` is
/// called for the second symbol of a two-symbol unit.
pub fn pull_string_byte(first: u8, mut next: impl FnMut() -> Result<u8>) -> Result<Option<u8>> {
    match first {
        0 => Ok(None),
        1..=87 => Ok(Some(0x20 + (first - 1))),
        PAGE_BASE..=93 => {
            let page = first - PAGE_BASE;
            let offset = next()?;
            let rank = u16::from(page) * u16::from(SYMBOL_COUNT) + u16::from(offset);
            if rank >= PAGED_BYTE_COUNT {
                return Err(TabwireError::Transport(format!(
                    "string unit rank {rank} has no byte mapping"
                )));
            }
            let byte = if rank < 32 {
                rank as u8
            } else {
                SINGLE_RANGE_LAST + 1 + (rank - 32) as u8
            };
            Ok(Some(byte))
        }
        _ => Err(TabwireError::Transport(format!(
            "symbol {first} is not a valid string unit"
        ))),
    }
}
