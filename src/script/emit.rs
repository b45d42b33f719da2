//! The source generator: renders scheduled instructions into literal
//! program text.
//!
//! Responsibilities: shortest-round-trip numeric literals, minimal-length
//! string quoting, identifier-safe key syntax, deterministic in-definition
//! key ordering, and reusable variable-name allocation with an indexed
//! overflow scheme once the single-letter names run out.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::codec::decompose_f64;
use crate::error::{Result, TabwireError};
use crate::value::{NodeId, Value};

use super::schedule::{Instr, Operand, Schedule};

/// Reserved words that can never render as bare identifier keys.
const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function",
    "goto", "if", "in", "local", "nil", "not", "or", "repeat", "return",
    "then", "true", "until", "while",
];

/// The single-letter name supply. `x` is excluded: it names the overflow
/// slot table.
const SHORT_NAMES: &[u8] = b"abcdefghijklmnopqrstuvwyz";

/// 2^53: the largest magnitude at which every integer is exactly
/// representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

// --- NUMERIC LITERALS ---

/// Renders a double as the shortest literal that parses back bit-exactly,
/// chosen among plain integer, shortest decimal, scientific, `N/D` and
/// `N*2^k` forms; ties prefer the earlier (more canonical) form.
///
/// Non-finite values render as division expressions (`1/0`, `-1/0`, `0/0`)
/// so the regeneration program needs no special constants.
pub fn format_number(x: f64) -> String {
    if x.is_nan() {
        return "0/0".into();
    }
    if x == f64::INFINITY {
        return "1/0".into();
    }
    if x == f64::NEG_INFINITY {
        return "-1/0".into();
    }

    let bits = x.to_bits();
    let mut candidates: Vec<String> = Vec::new();
    if x.fract() == 0.0 && x.abs() <= MAX_SAFE_INTEGER {
        candidates.push(format!("{}", x as i64));
    }
    candidates.push(format!("{x}"));
    candidates.push(format!("{x:e}"));
    if x != 0.0 {
        let (neg, sig, exp) = decompose_f64(x);
        let sign = if neg { "-" } else { "" };
        if (-63..0).contains(&exp) {
            candidates.push(format!("{sign}{sig}/{}", 1u64 << -exp));
        }
        if exp != 0 {
            candidates.push(format!("{sign}{sig}*2^{exp}"));
        }
    }
    candidates.retain(|s| {
        parse_number_literal(s).map(|y| y.to_bits() == bits) == Some(true)
    });
    candidates
        .into_iter()
        .min_by_key(String::len)
        .unwrap_or_else(|| format!("{x}"))
}

/// Evaluates any literal form [`format_number`] can produce. Audit helper:
/// external checks use it to verify round-trips without an interpreter.
pub fn parse_number_literal(s: &str) -> Option<f64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some((mantissa, power)) = body.split_once("*2^") {
        let k: i32 = power.parse().ok()?;
        parse_ratio(mantissa)? * pow2(k)?
    } else if body.contains('/') {
        parse_ratio(body)?
    } else {
        body.parse::<f64>().ok()?
    };
    Some(if neg { -value } else { value })
}

fn parse_ratio(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((n, d)) => {
            let n = n.trim().parse::<u64>().ok()? as f64;
            let d = d.trim().parse::<u64>().ok()? as f64;
            // 0/0 and 1/0 intentionally produce NaN and infinity, matching
            // the arithmetic of the consuming interpreter.
            Some(n / d)
        }
        None => Some(s.trim().parse::<u64>().ok()? as f64),
    }
}

/// Exact power of two, including the subnormal range.
fn pow2(e: i32) -> Option<f64> {
    if (-1022..=1023).contains(&e) {
        Some(f64::from_bits(((e + 1023) as u64) << 52))
    } else if (-1074..-1022).contains(&e) {
        Some(f64::from_bits(1u64 << (e + 1074)))
    } else {
        None
    }
}

// --- STRING LITERALS ---

/// Renders a byte string as the shorter of its single- and double-quoted
/// escaped forms; ties prefer double quotes.
pub fn format_string(bytes: &[u8]) -> String {
    let double = quote_with(bytes, b'"');
    let single = quote_with(bytes, b'\'');
    if single.len() < double.len() {
        single
    } else {
        double
    }
}

fn quote_with(bytes: &[u8], quote: u8) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push(char::from(quote));
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            _ if b == quote => {
                out.push('\\');
                out.push(char::from(quote));
            }
            0x20..=0x7E => out.push(char::from(b)),
            _ => {
                // Decimal escapes must pad to three digits when a digit
                // follows, or the escape would swallow it.
                if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    out.push_str(&format!("\\{b:03}"));
                } else {
                    out.push_str(&format!("\\{b}"));
                }
            }
        }
    }
    out.push(char::from(quote));
    out
}

/// Decodes a quoted string literal back to its bytes. Audit helper,
/// mirroring [`parse_number_literal`].
pub fn parse_string_literal(s: &str) -> Option<Vec<u8>> {
    let raw = s.as_bytes();
    if raw.len() < 2 {
        return None;
    }
    let quote = raw[0];
    if (quote != b'"' && quote != b'\'') || raw[raw.len() - 1] != quote {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    let mut out = Vec::new();
    let mut i = 0;
    while i < inner.len() {
        let c = inner[i];
        if c == quote {
            return None;
        }
        if c != b'\\' {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        match *inner.get(i)? {
            b'\\' => {
                out.push(b'\\');
                i += 1;
            }
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            q @ (b'"' | b'\'') => {
                out.push(q);
                i += 1;
            }
            b'0'..=b'9' => {
                let mut value: u16 = 0;
                let mut digits = 0;
                while digits < 3 {
                    match inner.get(i) {
                        Some(d) if d.is_ascii_digit() => {
                            value = value * 10 + u16::from(d - b'0');
                            digits += 1;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                if value > 255 {
                    return None;
                }
                out.push(value as u8);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// True when the bytes form a bare identifier that is not a reserved word.
pub(crate) fn is_identifier(bytes: &[u8]) -> bool {
    let mut iter = bytes.iter();
    let Some(&first) = iter.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return false;
    }
    if !iter.all(|&b| b.is_ascii_alphanumeric() || b == b'_') {
        return false;
    }
    !KEYWORDS.iter().any(|kw| kw.as_bytes() == bytes)
}

/// Natural string ordering: embedded digit runs compare as numbers, so
/// `"a2"` sorts before `"a10"`.
pub(crate) fn natural_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (run_a, next_i) = digit_run(a, i);
            let (run_b, next_j) = digit_run(b, j);
            let ord = run_a
                .len()
                .cmp(&run_b.len())
                .then_with(|| run_a.cmp(run_b));
            if ord != Ordering::Equal {
                return ord;
            }
            i = next_i;
            j = next_j;
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

/// Digit run at `start` with leading zeros stripped (one digit minimum).
fn digit_run(s: &[u8], start: usize) -> (&[u8], usize) {
    let mut end = start;
    while end < s.len() && s[end].is_ascii_digit() {
        end += 1;
    }
    let mut lead = start;
    while lead + 1 < end && s[lead] == b'0' {
        lead += 1;
    }
    (&s[lead..end], end)
}

// --- NAME ALLOCATION ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Short(u8),
    Overflow(u32),
}

/// Free-list of short names plus the indexed overflow scheme. A name
/// returns to the free list once the last reference to its definition has
/// been emitted, bounding the distinct names alive at once.
#[derive(Debug)]
struct NamePool {
    free: BTreeSet<u8>,
    next_overflow: u32,
}

impl NamePool {
    fn new() -> Self {
        Self {
            free: (0..SHORT_NAMES.len() as u8).collect(),
            next_overflow: 1,
        }
    }

    fn alloc(&mut self) -> Slot {
        match self.free.iter().next().copied() {
            Some(i) => {
                self.free.remove(&i);
                Slot::Short(i)
            }
            None => {
                let n = self.next_overflow;
                self.next_overflow += 1;
                Slot::Overflow(n)
            }
        }
    }

    fn release(&mut self, slot: Slot) {
        if let Slot::Short(i) = slot {
            self.free.insert(i);
        }
    }
}

fn render_slot(slot: Slot) -> String {
    match slot {
        Slot::Short(i) => char::from(SHORT_NAMES[i as usize]).to_string(),
        Slot::Overflow(n) => format!("x[{n}]"),
    }
}

// --- STATEMENT EMISSION ---

/// Renders the scheduled instruction list into program text.
pub(crate) fn emit(sched: &Schedule) -> Result<String> {
    let mut remaining = count_references(sched);
    let mut names: HashMap<NodeId, Slot> = HashMap::new();
    let mut pool = NamePool::new();
    let mut overflow_declared = false;
    let mut out = String::new();

    for instr in &sched.instrs {
        let mut touched: Vec<NodeId> = Vec::new();
        match instr {
            Instr::Define { node, pairs } => {
                let slot = pool.alloc();
                if matches!(slot, Slot::Overflow(_)) && !overflow_declared {
                    out.push_str("local x = {}\n");
                    overflow_declared = true;
                }
                names.insert(*node, slot);
                let body = render_table(sched, pairs, &names, &mut touched)?;
                match slot {
                    Slot::Short(_) => {
                        out.push_str(&format!("local {} = {body}\n", render_slot(slot)));
                    }
                    Slot::Overflow(_) => {
                        out.push_str(&format!("{} = {body}\n", render_slot(slot)));
                    }
                }
            }
            Instr::Assign { target, key, value } => {
                touched.push(*target);
                let name = slot_of(&names, *target).map(render_slot)?;
                let rhs = render_operand(sched, value, &names, &mut touched)?;
                match key {
                    Operand::Literal(Value::Str(s)) if is_identifier(s) => {
                        let field = String::from_utf8_lossy(s);
                        out.push_str(&format!("{name}.{field} = {rhs}\n"));
                    }
                    _ => {
                        let k = render_operand(sched, key, &names, &mut touched)?;
                        out.push_str(&format!("{name}[{k}] = {rhs}\n"));
                    }
                }
            }
            Instr::Return { values } => {
                let exprs = values
                    .iter()
                    .map(|v| render_operand(sched, v, &names, &mut touched))
                    .collect::<Result<Vec<_>>>()?
                    .join(", ");
                out.push_str(&format!("return {exprs}\n"));
            }
        }
        // Names whose last reference was just emitted go back to the pool,
        // after the statement so the reuse cannot land inside it.
        for id in touched {
            let count = remaining.entry(id).or_insert(0);
            *count = count.saturating_sub(1);
            if *count == 0 {
                if let Some(slot) = names.get(&id) {
                    pool.release(*slot);
                }
            }
        }
    }
    Ok(out)
}

fn slot_of(names: &HashMap<NodeId, Slot>, node: NodeId) -> Result<Slot> {
    names.get(&node).copied().ok_or_else(|| {
        TabwireError::Internal(format!("generator: no name allocated for {node}"))
    })
}

/// Total emitted-reference count per named node: operand references plus
/// assignment targets, through inline bodies.
fn count_references(sched: &Schedule) -> HashMap<NodeId, usize> {
    let mut counts: HashMap<NodeId, usize> = HashMap::new();
    for instr in &sched.instrs {
        match instr {
            Instr::Define { pairs, .. } => {
                for (k, v) in pairs {
                    count_operand(sched, k, &mut counts);
                    count_operand(sched, v, &mut counts);
                }
            }
            Instr::Assign { target, key, value } => {
                *counts.entry(*target).or_insert(0) += 1;
                count_operand(sched, key, &mut counts);
                count_operand(sched, value, &mut counts);
            }
            Instr::Return { values } => {
                for v in values {
                    count_operand(sched, v, &mut counts);
                }
            }
        }
    }
    counts
}

fn count_operand(sched: &Schedule, op: &Operand, counts: &mut HashMap<NodeId, usize>) {
    match op {
        Operand::Ref(id) => {
            *counts.entry(*id).or_insert(0) += 1;
        }
        Operand::Inline(id) => {
            if let Some(pairs) = sched.inline_pairs.get(id) {
                for (k, v) in pairs {
                    count_operand(sched, k, counts);
                    count_operand(sched, v, counts);
                }
            }
        }
        Operand::Literal(_) => {}
    }
}

fn render_operand(
    sched: &Schedule,
    op: &Operand,
    names: &HashMap<NodeId, Slot>,
    touched: &mut Vec<NodeId>,
) -> Result<String> {
    match op {
        Operand::Literal(v) => render_scalar(v),
        Operand::Ref(id) => {
            touched.push(*id);
            slot_of(names, *id).map(render_slot)
        }
        Operand::Inline(id) => {
            let pairs = sched.inline_pairs.get(id).ok_or_else(|| {
                TabwireError::Internal(format!("generator: missing inline body for {id}"))
            })?;
            render_table(sched, pairs, names, touched)
        }
    }
}

fn render_scalar(v: &Value) -> Result<String> {
    match v {
        Value::Number(x) => Ok(format_number(*x)),
        Value::Str(s) => Ok(format_string(s)),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
        Value::Node(id) => Err(TabwireError::Internal(format!(
            "generator: composite {id} where a scalar literal was expected"
        ))),
    }
}

/// Rank for deterministic in-definition key ordering: numeric keys
/// ascending, string keys in natural order, false, true, then composite
/// keys in discovery order.
fn key_rank(sched: &Schedule, key: &Operand) -> (u8, f64, Vec<u8>, usize) {
    match key {
        Operand::Literal(Value::Number(x)) => (0, *x, Vec::new(), 0),
        Operand::Literal(Value::Str(s)) => (1, 0.0, s.clone(), 0),
        Operand::Literal(Value::Bool(false)) => (2, 0.0, Vec::new(), 0),
        Operand::Literal(Value::Bool(true)) => (3, 0.0, Vec::new(), 0),
        Operand::Ref(id) | Operand::Inline(id) => (
            4,
            0.0,
            Vec::new(),
            sched.order_index.get(id).copied().unwrap_or(usize::MAX),
        ),
        Operand::Literal(Value::Node(id)) => {
            // Scheduler never leaves a composite as a literal; rank it last.
            (5, 0.0, Vec::new(), id.as_u32() as usize)
        }
    }
}

fn compare_keys(sched: &Schedule, a: &Operand, b: &Operand) -> Ordering {
    let ra = key_rank(sched, a);
    let rb = key_rank(sched, b);
    ra.0.cmp(&rb.0)
        .then_with(|| ra.1.total_cmp(&rb.1))
        .then_with(|| natural_cmp(&ra.2, &rb.2))
        .then_with(|| ra.3.cmp(&rb.3))
}

fn render_table(
    sched: &Schedule,
    pairs: &[(Operand, Operand)],
    names: &HashMap<NodeId, Slot>,
    touched: &mut Vec<NodeId>,
) -> Result<String> {
    // Maximal consecutive 1..n numeric prefix renders positionally.
    let mut array: Vec<&Operand> = Vec::new();
    loop {
        let want = (array.len() + 1) as f64;
        let Some((_, v)) = pairs.iter().find(
            |(k, _)| matches!(k, Operand::Literal(Value::Number(x)) if *x == want),
        ) else {
            break;
        };
        array.push(v);
    }

    let mut rest: Vec<&(Operand, Operand)> = pairs
        .iter()
        .filter(|(k, _)| {
            !matches!(k, Operand::Literal(Value::Number(x))
                if x.fract() == 0.0 && *x >= 1.0 && *x <= array.len() as f64)
        })
        .collect();
    rest.sort_by(|p, q| compare_keys(sched, &p.0, &q.0));

    let mut elements: Vec<String> = Vec::new();
    for v in array {
        elements.push(render_operand(sched, v, names, touched)?);
    }
    for (k, v) in rest {
        let value = render_operand(sched, v, names, touched)?;
        match k {
            Operand::Literal(Value::Str(s)) if is_identifier(s) => {
                elements.push(format!("{} = {value}", String::from_utf8_lossy(s)));
            }
            _ => {
                let key = render_operand(sched, k, names, touched)?;
                elements.push(format!("[{key}] = {value}"));
            }
        }
    }
    Ok(format!("{{{}}}", elements.join(", ")))
}
