//! The value codec: symbol-level encoding of scalars and back-references.
//!
//! Both directions share one contract: every value, the first time it is
//! introduced, enters the [`KnownValuePool`]; every later occurrence is a
//! back-reference to its pool index. Pool order must be identical on the
//! encode and decode side for the same sequence of first appearances; this
//! ordering dependency is the chief correctness invariant of the codec.
//!
//! ## Token grammar (symbol values)
//!
//! - `0` END: terminates string runs and pair lists.
//! - `1` NEW-COMPOSITE: introduces a composite node.
//! - `2` NUMBER: class symbol, then for the extended form a varint odd
//!   significand and a zigzag-varint binary exponent.
//! - `3` STRING: byte units terminated by symbol `0`.
//! - `4` REF: varint pool index.

use std::collections::HashMap;

use crate::alphabet;
use crate::error::{Result, TabwireError};
use crate::value::{NodeId, Value};

/// Terminator symbol.
pub const SYM_END: u8 = 0;
/// Introduces a composite node.
pub const SYM_COMPOSITE: u8 = 1;
/// Introduces a number.
pub const SYM_NUMBER: u8 = 2;
/// Introduces a string.
pub const SYM_STRING: u8 = 3;
/// Back-reference into the known-value pool.
pub const SYM_REF: u8 = 4;

/// Pool index of the NaN sentinel.
pub const POOL_NAN: usize = 0;
/// Pool index of +0.
pub const POOL_POS_ZERO: usize = 1;
/// Pool index of −0.
pub const POOL_NEG_ZERO: usize = 2;
/// Pool index of +∞.
pub const POOL_POS_INF: usize = 3;
/// Pool index of −∞.
pub const POOL_NEG_INF: usize = 4;
/// Pool index of `false`.
pub const POOL_FALSE: usize = 5;
/// Pool index of `true`.
pub const POOL_TRUE: usize = 6;
/// Pool index of the root container.
pub const POOL_ROOT: usize = 7;

/// Largest magnitude encoded by the one-symbol direct number class.
const DIRECT_MAX: f64 = 45.0;

/// Varint digit base; symbols `0..=46` are terminal digits, `47..=93`
/// carry a digit plus a continuation mark.
const VARINT_BASE: u64 = 47;

/// Append-only ordered registry of values already materialized.
///
/// Seeded with the eight fixed sentinels at indices `0..=7`. The maps exist
/// for the encode side's de-duplication; the decode side only appends.
#[derive(Debug, Clone)]
pub struct KnownValuePool {
    entries: Vec<Value>,
    numbers: HashMap<u64, usize>,
    strings: HashMap<Vec<u8>, usize>,
    nodes: HashMap<NodeId, usize>,
}

impl KnownValuePool {
    /// Creates a pool seeded with the fixed sentinels.
    ///
    /// The root-container slot holds a placeholder until the decode side
    /// binds it with [`set_root`](Self::set_root); the encode side never
    /// references it.
    pub fn seeded() -> Self {
        Self {
            entries: vec![
                Value::Number(f64::NAN),
                Value::Number(0.0),
                Value::Number(-0.0),
                Value::Number(f64::INFINITY),
                Value::Number(f64::NEG_INFINITY),
                Value::Bool(false),
                Value::Bool(true),
                Value::Bool(false), // root-container placeholder
            ],
            numbers: HashMap::new(),
            strings: HashMap::new(),
            nodes: HashMap::new(),
        }
    }

    /// Binds the root-container sentinel to a concrete node, on both sides:
    /// the encoder resolves later references to it through `lookup`.
    pub fn set_root(&mut self, root: Value) {
        if let Value::Node(id) = &root {
            self.nodes.insert(*id, POOL_ROOT);
        }
        self.entries[POOL_ROOT] = root;
    }

    /// Pool index serving `value` without a fresh introduction, if any:
    /// a fixed sentinel or a previously registered value.
    pub fn lookup(&self, value: &Value) -> Option<usize> {
        if let Some(idx) = sentinel_index(value) {
            return Some(idx);
        }
        match value {
            Value::Number(x) => self.numbers.get(&x.to_bits()).copied(),
            Value::Str(s) => self.strings.get(s).copied(),
            Value::Node(id) => self.nodes.get(id).copied(),
            Value::Bool(_) => None, // always a sentinel
        }
    }

    /// Appends a newly introduced value, returning its index.
    pub fn register(&mut self, value: Value) -> usize {
        let idx = self.entries.len();
        match &value {
            Value::Number(x) => {
                self.numbers.insert(x.to_bits(), idx);
            }
            Value::Str(s) => {
                self.strings.insert(s.clone(), idx);
            }
            Value::Node(id) => {
                self.nodes.insert(*id, idx);
            }
            Value::Bool(_) => {}
        }
        self.entries.push(value);
        idx
    }

    /// Looks a back-reference up.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.entries.get(idx)
    }

    /// Number of entries, sentinels included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true; the pool is sentinel-seeded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sentinel slot for a value, if it has one. Any NaN payload collapses onto
/// the canonical sentinel.
fn sentinel_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(x) if x.is_nan() => Some(POOL_NAN),
        Value::Number(x) if *x == 0.0 => Some(if x.is_sign_negative() {
            POOL_NEG_ZERO
        } else {
            POOL_POS_ZERO
        }),
        Value::Number(x) if *x == f64::INFINITY => Some(POOL_POS_INF),
        Value::Number(x) if *x == f64::NEG_INFINITY => Some(POOL_NEG_INF),
        Value::Bool(false) => Some(POOL_FALSE),
        Value::Bool(true) => Some(POOL_TRUE),
        _ => None,
    }
}

/// Sequential cursor over a validated symbol stream.
#[derive(Debug)]
pub struct SymbolReader<'s> {
    symbols: &'s [u8],
    pos: usize,
}

impl<'s> SymbolReader<'s> {
    /// Creates a cursor at the start of `symbols`.
    pub fn new(symbols: &'s [u8]) -> Self {
        Self { symbols, pos: 0 }
    }

    /// Consumes the next symbol.
    pub fn next(&mut self) -> Result<u8> {
        let s = self
            .symbols
            .get(self.pos)
            .copied()
            .ok_or_else(|| TabwireError::Transport("truncated symbol stream".into()))?;
        self.pos += 1;
        Ok(s)
    }

    /// Returns true once every symbol has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.symbols.len()
    }

    /// Current cursor position, for diagnostics.
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Appends a varint in little-endian base-47 chunks.
pub fn push_varint(mut v: u64, out: &mut Vec<u8>) {
    loop {
        let chunk = (v % VARINT_BASE) as u8;
        v /= VARINT_BASE;
        if v == 0 {
            out.push(chunk);
            return;
        }
        out.push(chunk + VARINT_BASE as u8);
    }
}

/// Reads a varint, rejecting encodings that overflow `u64`.
pub fn read_varint(r: &mut SymbolReader<'_>) -> Result<u64> {
    let mut value: u64 = 0;
    let mut scale: u64 = 1;
    loop {
        let sym = r.next()?;
        let (digit, done) = if u64::from(sym) < VARINT_BASE {
            (u64::from(sym), true)
        } else {
            (u64::from(sym) - VARINT_BASE, false)
        };
        value = digit
            .checked_mul(scale)
            .and_then(|d| value.checked_add(d))
            .ok_or_else(|| TabwireError::Transport("varint overflow".into()))?;
        if done {
            return Ok(value);
        }
        scale = scale
            .checked_mul(VARINT_BASE)
            .ok_or_else(|| TabwireError::Transport("varint overflow".into()))?;
    }
}

/// Appends a signed varint (zigzag).
pub fn push_svarint(v: i64, out: &mut Vec<u8>) {
    push_varint(((v << 1) ^ (v >> 63)) as u64, out);
}

/// Reads a signed varint (zigzag).
pub fn read_svarint(r: &mut SymbolReader<'_>) -> Result<i64> {
    let raw = read_varint(r)?;
    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}

/// Splits a finite, non-zero double into (negative, odd significand,
/// binary exponent) straight from its IEEE bits, so that
/// `value = ±sig * 2^exp` exactly.
pub fn decompose_f64(x: f64) -> (bool, u64, i32) {
    debug_assert!(x.is_finite() && x != 0.0);
    let bits = x.to_bits();
    let neg = bits >> 63 == 1;
    let ebits = ((bits >> 52) & 0x7FF) as i32;
    let frac = bits & ((1u64 << 52) - 1);
    let (mut sig, mut exp) = if ebits == 0 {
        (frac, -1074)
    } else {
        (frac | (1u64 << 52), ebits - 1075)
    };
    let tz = sig.trailing_zeros() as i32;
    sig >>= tz;
    exp += tz;
    (neg, sig, exp)
}

/// Rebuilds the double `±sig * 2^exp` bit-exactly by integer shifts; no
/// float arithmetic, so subnormals and the extremes of the exponent range
/// cannot double-round.
pub fn compose_f64(neg: bool, mut sig: u64, mut exp: i32) -> Result<f64> {
    if sig == 0 {
        return Err(TabwireError::Transport(
            "zero significand in number token".into(),
        ));
    }
    while sig < (1u64 << 52) && exp > -1074 {
        sig <<= 1;
        exp -= 1;
    }
    if sig >= (1u64 << 53) {
        return Err(TabwireError::Transport(
            "number significand wider than 53 bits".into(),
        ));
    }
    let magnitude = if sig >= (1u64 << 52) {
        let ebits = exp + 1075;
        if !(1..=2046).contains(&ebits) {
            return Err(TabwireError::Transport(
                "number exponent out of range".into(),
            ));
        }
        ((ebits as u64) << 52) | (sig & ((1u64 << 52) - 1))
    } else {
        // Normalization stopped at the subnormal boundary; anything below
        // it has no representation and must have come off a bad stream.
        if exp != -1074 {
            return Err(TabwireError::Transport(
                "number exponent out of range".into(),
            ));
        }
        sig
    };
    Ok(f64::from_bits(magnitude | (u64::from(neg) << 63)))
}

/// Emits a NUMBER token. The caller has already served sentinels (NaN, ±0,
/// ±∞) and pooled repeats as REFs; `x` is finite, non-zero and new.
pub fn push_number(x: f64, out: &mut Vec<u8>) {
    out.push(SYM_NUMBER);
    let ax = x.abs();
    if ax.fract() == 0.0 && (1.0..=DIRECT_MAX).contains(&ax) {
        let k = ax as u8 - 1;
        out.push(if x < 0.0 { k + 45 } else { k });
        return;
    }
    let (neg, sig, exp) = decompose_f64(x);
    out.push(if neg { 91 } else { 90 });
    push_varint(sig, out);
    push_svarint(i64::from(exp), out);
}

/// Reads the body of a NUMBER token (the tag symbol already consumed).
pub fn read_number(r: &mut SymbolReader<'_>) -> Result<f64> {
    let class = r.next()?;
    match class {
        0..=44 => Ok(f64::from(class + 1)),
        45..=89 => Ok(-f64::from(class - 44)),
        90 | 91 => {
            let sig = read_varint(r)?;
            let exp = read_svarint(r)?;
            let exp = i32::try_from(exp).map_err(|_| {
                TabwireError::Transport("number exponent out of range".into())
            })?;
            compose_f64(class == 91, sig, exp)
        }
        _ => Err(TabwireError::Transport(format!(
            "reserved number class symbol {class}"
        ))),
    }
}

/// Emits a STRING token.
pub fn push_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.push(SYM_STRING);
    for &b in bytes {
        alphabet::push_string_byte(b, out);
    }
    out.push(SYM_END);
}

/// Reads the body of a STRING token (the tag symbol already consumed).
pub fn read_string(r: &mut SymbolReader<'_>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let first = r.next()?;
        match alphabet::pull_string_byte(first, || r.next())? {
            Some(b) => out.push(b),
            None => return Ok(out),
        }
    }
}
