//! Graph streaming: composite bodies in and out of the symbol stream.
//!
//! Both directions walk composites through a FIFO worklist seeded with the
//! root container, so the pool's first-appearance order is identical on
//! each side without transmitting any node numbering.
//!
//! ## Body layout
//!
//! Per composite: the values of the maximal consecutive `1..n` numeric-key
//! prefix (keys implied), END, then the remaining key/value pairs, END.
//! A composite operand appearing for the first time is a single
//! NEW-COMPOSITE symbol; its body is queued and streamed after the current
//! one finishes.

use std::collections::VecDeque;

use crate::codec::{
    push_number, push_string, push_varint, read_number, read_string, read_varint,
    KnownValuePool, SymbolReader, SYM_COMPOSITE, SYM_END, SYM_NUMBER, SYM_REF,
    SYM_STRING,
};
use crate::error::{Result, TabwireError};
use crate::value::{Arena, NodeId, Value};

/// Streams the graph reachable from `root` into a symbol vector.
pub fn encode(arena: &Arena, root: NodeId) -> Result<Vec<u8>> {
    let mut pool = KnownValuePool::seeded();
    pool.set_root(Value::Node(root));
    let mut work: VecDeque<NodeId> = VecDeque::new();
    work.push_back(root);

    let mut out = Vec::new();
    while let Some(node) = work.pop_front() {
        encode_body(arena, node, &mut pool, &mut work, &mut out);
    }
    log::debug!(
        "encoded graph into {} symbols ({} pool entries)",
        out.len(),
        pool.len()
    );
    Ok(out)
}

fn encode_body(
    arena: &Arena,
    node: NodeId,
    pool: &mut KnownValuePool,
    work: &mut VecDeque<NodeId>,
    out: &mut Vec<u8>,
) {
    let pairs = arena.pairs(node);

    // Array part: values under the maximal consecutive 1..n numeric keys.
    let mut array_len = 0usize;
    loop {
        let key = Value::Number((array_len + 1) as f64);
        let Some(value) = arena.get(node, &key) else {
            break;
        };
        encode_value(value, pool, work, out);
        array_len += 1;
    }
    out.push(SYM_END);

    for (key, value) in pairs {
        if let Value::Number(x) = key {
            if x.fract() == 0.0 && *x >= 1.0 && *x <= array_len as f64 {
                continue;
            }
        }
        encode_value(key, pool, work, out);
        encode_value(value, pool, work, out);
    }
    out.push(SYM_END);
}

fn encode_value(
    value: &Value,
    pool: &mut KnownValuePool,
    work: &mut VecDeque<NodeId>,
    out: &mut Vec<u8>,
) {
    if let Some(idx) = pool.lookup(value) {
        out.push(SYM_REF);
        push_varint(idx as u64, out);
        return;
    }
    match value {
        Value::Number(x) => push_number(*x, out),
        Value::Str(s) => push_string(s, out),
        Value::Node(id) => {
            out.push(SYM_COMPOSITE);
            work.push_back(*id);
        }
        // Booleans are fixed sentinels and always hit the lookup above.
        Value::Bool(_) => return,
    }
    pool.register(value.clone());
}

/// A fully materialized inbound graph.
#[derive(Debug)]
pub struct Decoded {
    /// The rebuilt graph.
    pub arena: Arena,
    /// The root container node.
    pub root: NodeId,
    /// Final pool size, for inspection.
    pub pool_len: usize,
}

/// Rebuilds the graph from a verified symbol stream.
///
/// Consumes the entire stream; trailing symbols after the last queued body
/// are a transport error.
pub fn decode(symbols: &[u8]) -> Result<Decoded> {
    let mut r = SymbolReader::new(symbols);
    let mut arena = Arena::new();
    let mut pool = KnownValuePool::seeded();

    let root = arena.add_node();
    pool.set_root(Value::Node(root));
    let mut work: VecDeque<NodeId> = VecDeque::new();
    work.push_back(root);

    while let Some(node) = work.pop_front() {
        decode_body(&mut r, &mut arena, &mut pool, &mut work, node)?;
    }
    if !r.is_exhausted() {
        return Err(TabwireError::Transport(format!(
            "{} trailing symbols after the last composite body",
            symbols.len() - r.position()
        )));
    }
    log::debug!(
        "decoded {} composites from {} symbols",
        arena.len(),
        symbols.len()
    );
    Ok(Decoded {
        arena,
        root,
        pool_len: pool.len(),
    })
}

fn decode_body(
    r: &mut SymbolReader<'_>,
    arena: &mut Arena,
    pool: &mut KnownValuePool,
    work: &mut VecDeque<NodeId>,
    node: NodeId,
) -> Result<()> {
    let mut index = 1u64;
    while let Some(value) = decode_value(r, arena, pool, work)? {
        arena.insert(node, Value::Number(index as f64), value);
        index += 1;
    }
    loop {
        let Some(key) = decode_value(r, arena, pool, work)? else {
            return Ok(());
        };
        let Some(value) = decode_value(r, arena, pool, work)? else {
            return Err(TabwireError::Transport(
                "pair list truncated: key without value".into(),
            ));
        };
        arena.insert(node, key, value);
    }
}

/// Reads one value token; `None` is the END terminator.
fn decode_value(
    r: &mut SymbolReader<'_>,
    arena: &mut Arena,
    pool: &mut KnownValuePool,
    work: &mut VecDeque<NodeId>,
) -> Result<Option<Value>> {
    match r.next()? {
        SYM_END => Ok(None),
        SYM_COMPOSITE => {
            let id = arena.add_node();
            pool.register(Value::Node(id));
            work.push_back(id);
            Ok(Some(Value::Node(id)))
        }
        SYM_NUMBER => {
            let x = read_number(r)?;
            pool.register(Value::Number(x));
            Ok(Some(Value::Number(x)))
        }
        SYM_STRING => {
            let s = read_string(r)?;
            pool.register(Value::Str(s.clone()));
            Ok(Some(Value::Str(s)))
        }
        SYM_REF => {
            let idx = read_varint(r)?;
            let idx = usize::try_from(idx).map_err(|_| {
                TabwireError::Transport("pool reference out of range".into())
            })?;
            pool.get(idx)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    TabwireError::Transport(format!(
                        "reference to unknown pool index {idx}"
                    ))
                })
        }
        sym => Err(TabwireError::Transport(format!(
            "unexpected token symbol {sym}"
        ))),
    }
}
