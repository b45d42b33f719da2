//! The in-memory data model: scalars, composite nodes, and the arena.
//!
//! Composite nodes live in an [`Arena`] and are addressed by stable
//! [`NodeId`] indices. Every edge between composites is a plain index, never
//! an owning reference, so shared nodes and reference cycles cost nothing
//! extra and need no special-case cleanup.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;

/// A strong type identifying a composite node inside one [`Arena`].
///
/// Identity is reference identity: two structurally identical nodes remain
/// distinct unless they share the same `NodeId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new NodeId.
    /// Restricted to the crate to prevent arbitrary creation.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single value in the graph: a scalar or a handle to a composite node.
///
/// The derived `PartialEq` gives exactly the key-equality semantics the
/// codec needs: numbers compare by IEEE equality (`NaN` is never equal to
/// anything, `+0 == -0`), strings by content, composites by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A double-precision float, including NaN, signed zero and infinities.
    Number(f64),
    /// An arbitrary byte string.
    Str(Vec<u8>),
    /// A boolean.
    Bool(bool),
    /// A composite node, addressed into the owning [`Arena`].
    Node(NodeId),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn str(s: impl Into<Vec<u8>>) -> Self {
        Self::Str(s.into())
    }

    /// Returns true if the value is a composite handle.
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Short kind name for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Node(_) => "composite",
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Number(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.as_bytes().to_vec())
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// Scalar equivalence used for pool de-duplication and isomorphism checks:
/// numbers compare by bit pattern except that any NaN matches any NaN (the
/// wire collapses NaN payloads onto the canonical sentinel).
pub(crate) fn scalar_matches(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits()
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

#[derive(Debug, Default, Clone)]
struct NodeData {
    pairs: Vec<(Value, Value)>,
}

/// The container for the entire composite graph.
///
/// Acts as an arena allocator for nodes; all node-to-node edges are
/// `NodeId` indices into this arena.
#[derive(Debug, Default, Clone)]
pub struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Allocates a new, empty composite node and returns its id.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData::default());
        id
    }

    /// Number of composite nodes allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Writes one key/value pair into a node.
    ///
    /// If a pair with an equal key already exists (IEEE equality for numbers,
    /// so a NaN key is always a fresh entry) its value is replaced; otherwise
    /// the pair is appended.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not belong to this arena.
    pub fn insert(&mut self, node: NodeId, key: Value, value: Value) {
        let data = self
            .nodes
            .get_mut(node.as_u32() as usize)
            .expect("Arena invariant violated: node id out of bounds");
        if let Some(slot) = data.pairs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            data.pairs.push((key, value));
        }
    }

    /// Looks up the value stored under `key`, if any.
    pub fn get(&self, node: NodeId, key: &Value) -> Option<&Value> {
        self.pairs(node)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// The key/value pairs of a node, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `node` does not belong to this arena.
    pub fn pairs(&self, node: NodeId) -> &[(Value, Value)] {
        &self
            .nodes
            .get(node.as_u32() as usize)
            .expect("Arena invariant violated: node id out of bounds")
            .pairs
    }

    /// Checks graph isomorphism between `root_a` in this arena and `root_b`
    /// in `other`: same scalar values, same sharing pattern, same cycle
    /// structure. Byte-identical object identity across two arenas is
    /// meaningless; this is the round-trip equivalence the codec guarantees.
    ///
    /// Pairs whose key is a composite (or NaN) are matched positionally
    /// among their class, which is sufficient for the codec's deterministic
    /// layouts.
    pub fn isomorphic(&self, root_a: &Value, other: &Arena, root_b: &Value) -> bool {
        let mut fwd: HashMap<NodeId, NodeId> = HashMap::new();
        let mut rev: HashMap<NodeId, NodeId> = HashMap::new();
        let mut work: VecDeque<(NodeId, NodeId)> = VecDeque::new();

        if !match_values(root_a, root_b, &mut fwd, &mut rev, &mut work) {
            return false;
        }

        while let Some((a, b)) = work.pop_front() {
            let pa = self.pairs(a);
            let pb = other.pairs(b);
            if pa.len() != pb.len() {
                return false;
            }

            // Scalar-keyed pairs match by key; composite- and NaN-keyed
            // pairs match positionally within their class.
            let mut odd_a: Vec<&(Value, Value)> = Vec::new();
            let mut odd_b: Vec<&(Value, Value)> = Vec::new();
            for pair in pb {
                if positional_key(&pair.0) {
                    odd_b.push(pair);
                }
            }
            for pair in pa {
                if positional_key(&pair.0) {
                    odd_a.push(pair);
                    continue;
                }
                let Some(partner) = pb
                    .iter()
                    .find(|(k, _)| !positional_key(k) && scalar_matches(k, &pair.0))
                else {
                    return false;
                };
                if !match_values(&pair.1, &partner.1, &mut fwd, &mut rev, &mut work) {
                    return false;
                }
            }
            if odd_a.len() != odd_b.len() {
                return false;
            }
            for ((ka, va), (kb, vb)) in odd_a.iter().zip(odd_b.iter()) {
                if !match_values(ka, kb, &mut fwd, &mut rev, &mut work)
                    || !match_values(va, vb, &mut fwd, &mut rev, &mut work)
                {
                    return false;
                }
            }
        }
        true
    }
}

fn positional_key(key: &Value) -> bool {
    match key {
        Value::Node(_) => true,
        Value::Number(x) => x.is_nan(),
        _ => false,
    }
}

fn match_values(
    a: &Value,
    b: &Value,
    fwd: &mut HashMap<NodeId, NodeId>,
    rev: &mut HashMap<NodeId, NodeId>,
    work: &mut VecDeque<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Value::Node(na), Value::Node(nb)) => {
            match (fwd.get(na), rev.get(nb)) {
                (Some(mapped), Some(back)) => mapped == nb && back == na,
                (None, None) => {
                    fwd.insert(*na, *nb);
                    rev.insert(*nb, *na);
                    work.push_back((*na, *nb));
                    true
                }
                // One side already paired with a different partner.
                _ => false,
            }
        }
        _ => scalar_matches(a, b),
    }
}
