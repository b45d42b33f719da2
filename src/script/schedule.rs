//! The definition scheduler: orders composite definitions to respect
//! dependencies, decides inlining, and resolves cycles through deferred
//! assignment statements.
//!
//! A composite is definable once its readiness deficit reaches zero. The
//! heap is ordered by (deficit ascending, usage count descending): defining
//! a heavily used node first unblocks more dependents sooner. Cycles keep
//! every member's deficit above zero, so the minimum-deficit extraction
//! defines one member with its blocked pairs deferred; those pairs surface
//! later as assignment statements once their operands resolve.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{Result, TabwireError};
use crate::value::{Arena, NodeId, Value};

use super::discover::{discover, Discovery};

/// Inlining nesting bound: a single-use composite nests into its user only
/// while the rendered literal stays at most this deep. Stable for format
/// version 1.
pub(crate) const INLINE_DEPTH_MAX: usize = 3;

/// One operand of an instruction.
#[derive(Debug, Clone)]
pub(crate) enum Operand {
    /// A scalar rendered literally at the use site.
    Literal(Value),
    /// A reference to a named definition.
    Ref(NodeId),
    /// A single-use composite embedded directly into its user's literal.
    Inline(NodeId),
}

/// One scheduled instruction of the regeneration program.
#[derive(Debug)]
pub(crate) enum Instr {
    /// Introduces a named slot bound to a composite's resolvable pairs.
    Define {
        node: NodeId,
        pairs: Vec<(Operand, Operand)>,
    },
    /// Writes a single deferred pair into a previously defined slot.
    Assign {
        target: NodeId,
        key: Operand,
        value: Operand,
    },
    /// Designates the final output value(s).
    Return { values: Vec<Operand> },
}

/// The scheduled program plus the side tables the emitter needs.
#[derive(Debug)]
pub(crate) struct Schedule {
    pub instrs: Vec<Instr>,
    /// Bodies of inlined composites, rendered at their single use site.
    pub inline_pairs: HashMap<NodeId, Vec<(Operand, Operand)>>,
    /// Discovery rank per node, for deterministic composite-key ordering.
    pub order_index: HashMap<NodeId, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Named,
    Inlined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    deficit: usize,
    uses: usize,
    node: NodeId,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the maximum; order so the best candidate is
        // greatest: lowest deficit, then highest usage, then lowest id.
        other
            .deficit
            .cmp(&self.deficit)
            .then(self.uses.cmp(&other.uses))
            .then(other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs discovery and scheduling over the graph reachable from `roots`.
pub(crate) fn schedule(arena: &Arena, roots: &[Value]) -> Result<Schedule> {
    let Discovery {
        mut records,
        order,
    } = discover(arena, roots);

    let order_index: HashMap<NodeId, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut resolved: HashMap<NodeId, Resolution> = HashMap::new();
    let mut depth: HashMap<NodeId, usize> = HashMap::new();
    let mut inline_pairs: HashMap<NodeId, Vec<(Operand, Operand)>> = HashMap::new();
    let mut instrs: Vec<Instr> = Vec::new();

    let mut heap: BinaryHeap<HeapEntry> = records
        .iter()
        .map(|(id, rec)| HeapEntry {
            deficit: rec.deficit,
            uses: rec.uses,
            node: *id,
        })
        .collect();

    while let Some(entry) = heap.pop() {
        if resolved.contains_key(&entry.node) {
            continue;
        }
        let rec = records
            .get(&entry.node)
            .ok_or_else(|| internal("heap entry without scheduling record"))?;
        if entry.deficit != rec.deficit {
            // Stale entry; a fresher one is in the heap.
            continue;
        }

        // Collect the pairs whose operands are already resolvable; blocked
        // pairs stay deferred and come back as assignments.
        let mut body: Vec<(Operand, Operand)> = Vec::new();
        let mut nesting = 1usize;
        for (i, (key, value)) in arena.pairs(entry.node).iter().enumerate() {
            if rec.blocked[i] > 0 {
                continue;
            }
            let k = operand(key, &resolved)?;
            let v = operand(value, &resolved)?;
            for op in [&k, &v] {
                if let Operand::Inline(child) = op {
                    let child_depth = depth.get(child).copied().unwrap_or(1);
                    nesting = nesting.max(1 + child_depth);
                }
            }
            body.push((k, v));
        }

        let inlinable =
            rec.deficit == 0 && rec.uses == 1 && nesting <= INLINE_DEPTH_MAX;
        if inlinable {
            inline_pairs.insert(entry.node, body);
            resolved.insert(entry.node, Resolution::Inlined);
            depth.insert(entry.node, nesting);
        } else {
            instrs.push(Instr::Define {
                node: entry.node,
                pairs: body,
            });
            resolved.insert(entry.node, Resolution::Named);
            depth.insert(entry.node, 1);
        }

        // Walk back-edges: unblock dependents, re-admit the undefined ones,
        // emit assignments for the already-defined (deferred/cyclic) ones.
        let dependents = records
            .get(&entry.node)
            .map(|r| r.dependents.clone())
            .unwrap_or_default();
        for edge in dependents {
            log::trace!(
                "edge {} -> {} pair {} via {:?}",
                entry.node,
                edge.user,
                edge.pair,
                edge.role
            );
            let user_rec = records
                .get_mut(&edge.user)
                .ok_or_else(|| internal("back-edge to unknown composite"))?;
            let slot = user_rec
                .blocked
                .get_mut(edge.pair)
                .ok_or_else(|| internal("back-edge pair index out of range"))?;
            *slot = slot
                .checked_sub(1)
                .ok_or_else(|| internal("pair unblocked more often than blocked"))?;
            if *slot > 0 {
                continue;
            }
            match resolved.get(&edge.user) {
                Some(Resolution::Named) => {
                    let (key, value) = &arena.pairs(edge.user)[edge.pair];
                    instrs.push(Instr::Assign {
                        target: edge.user,
                        key: operand(key, &resolved)?,
                        value: operand(value, &resolved)?,
                    });
                }
                Some(Resolution::Inlined) => {
                    // An inlined node had deficit zero, so it can own no
                    // deferred pairs.
                    return Err(internal("deferred pair targets an inlined composite"));
                }
                None => {
                    user_rec.deficit = user_rec
                        .deficit
                        .checked_sub(1)
                        .ok_or_else(|| internal("readiness deficit underflow"))?;
                    heap.push(HeapEntry {
                        deficit: user_rec.deficit,
                        uses: user_rec.uses,
                        node: edge.user,
                    });
                }
            }
        }
    }

    // Every discovered composite must have been defined or inlined; anything
    // left signals a dependency miscount in discovery.
    for id in records.keys() {
        if !resolved.contains_key(id) {
            return Err(internal(&format!(
                "composite {id} left undefined after the scheduler heap drained"
            )));
        }
    }

    let values = roots
        .iter()
        .map(|root| operand(root, &resolved))
        .collect::<Result<Vec<_>>>()?;
    instrs.push(Instr::Return { values });

    log::debug!(
        "scheduled {} instructions ({} inlined composites)",
        instrs.len(),
        inline_pairs.len()
    );
    Ok(Schedule {
        instrs,
        inline_pairs,
        order_index,
    })
}

fn operand(value: &Value, resolved: &HashMap<NodeId, Resolution>) -> Result<Operand> {
    match value {
        Value::Node(id) => match resolved.get(id) {
            Some(Resolution::Named) => Ok(Operand::Ref(*id)),
            Some(Resolution::Inlined) => Ok(Operand::Inline(*id)),
            None => Err(internal(&format!(
                "operand {id} referenced before being defined"
            ))),
        },
        scalar => Ok(Operand::Literal(scalar.clone())),
    }
}

fn internal(msg: &str) -> TabwireError {
    TabwireError::Internal(format!("scheduler: {msg}"))
}
