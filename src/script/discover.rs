//! Graph discovery: the first pass of the script generator.
//!
//! Walks the source graph once, without recursion, to find every composite
//! node, count live references, record dependency back-edges and compute
//! each node's readiness deficit. Terminates on arbitrarily deep or cyclic
//! graphs in memory proportional to the number of distinct composites.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::value::{Arena, NodeId, Value};

/// Which operand slot(s) of a pair reference the edge's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeRole {
    Key,
    Val,
    /// One pair using the same composite as both key and value collapses
    /// into a single back-edge.
    Both,
}

/// A dependency back-edge: `user`'s pair number `pair` has this node as an
/// operand and cannot be completed before this node is defined.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackEdge {
    pub user: NodeId,
    pub pair: usize,
    pub role: EdgeRole,
}

/// Per-composite scheduling state, created at discovery and consumed by the
/// definition scheduler.
#[derive(Debug, Default)]
pub(crate) struct SchedulingRecord {
    /// Count of this node's own pairs still blocked on an undefined
    /// composite operand.
    pub deficit: usize,
    /// Per-pair count of unresolved composite operands (0..=2).
    pub blocked: Vec<u8>,
    /// How many live references exist (pairs elsewhere plus return values).
    pub uses: usize,
    /// Who depends on this node being defined.
    pub dependents: Vec<BackEdge>,
}

/// Output of the discovery pass.
#[derive(Debug, Default)]
pub(crate) struct Discovery {
    pub records: HashMap<NodeId, SchedulingRecord>,
    /// Nodes in first-encounter order; used for deterministic composite-key
    /// ordering in rendered definitions.
    pub order: Vec<NodeId>,
}

fn as_node(v: &Value) -> Option<NodeId> {
    match v {
        Value::Node(id) => Some(*id),
        _ => None,
    }
}

/// Runs the discovery pass from the given root values.
pub(crate) fn discover(arena: &Arena, roots: &[Value]) -> Discovery {
    let mut disco = Discovery::default();
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut work: VecDeque<NodeId> = VecDeque::new();

    for root in roots {
        if let Some(id) = as_node(root) {
            disco.records.entry(id).or_default().uses += 1;
            if seen.insert(id) {
                disco.order.push(id);
                work.push_back(id);
            }
        }
    }

    while let Some(node) = work.pop_front() {
        let pairs = arena.pairs(node);
        let mut blocked = vec![0u8; pairs.len()];
        for (i, (key, value)) in pairs.iter().enumerate() {
            let mut edges: Vec<(NodeId, EdgeRole)> = Vec::new();
            match (as_node(key), as_node(value)) {
                (Some(k), Some(v)) if k == v => edges.push((k, EdgeRole::Both)),
                (Some(k), Some(v)) => {
                    edges.push((k, EdgeRole::Key));
                    edges.push((v, EdgeRole::Val));
                }
                (Some(k), None) => edges.push((k, EdgeRole::Key)),
                (None, Some(v)) => edges.push((v, EdgeRole::Val)),
                (None, None) => {}
            }
            for (operand, role) in edges {
                let rec = disco.records.entry(operand).or_default();
                rec.uses += if role == EdgeRole::Both { 2 } else { 1 };
                rec.dependents.push(BackEdge {
                    user: node,
                    pair: i,
                    role,
                });
                blocked[i] += 1;
                if seen.insert(operand) {
                    disco.order.push(operand);
                    work.push_back(operand);
                }
            }
        }
        let deficit = blocked.iter().filter(|&&b| b > 0).count();
        let rec = disco.records.entry(node).or_default();
        rec.blocked = blocked;
        rec.deficit = deficit;
    }

    log::trace!(
        "discovery: {} composites reachable from {} roots",
        disco.order.len(),
        roots.len()
    );
    disco
}
