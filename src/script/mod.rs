//! Program generation: turns a graph into the deterministic regeneration
//! program that rebuilds it, shared references and cycles included.
//!
//! Three sequential passes: [`discover`](discover::discover) walks the graph
//! and counts dependencies, [`schedule`](schedule::schedule) orders the
//! definitions and resolves cycles, and the emitter renders instruction by
//! instruction. Identical graphs always render to identical text.

mod discover;
mod emit;
mod schedule;

pub use emit::{format_number, format_string, parse_number_literal, parse_string_literal};

use crate::error::Result;
use crate::value::{Arena, Value};

/// Renders the regeneration program for the graph reachable from `roots`.
///
/// The program defines every reachable composite exactly once, patches
/// cyclic edges through assignment statements, and ends with a `return` of
/// the root values.
pub fn generate(arena: &Arena, roots: &[Value]) -> Result<String> {
    let sched = schedule::schedule(arena, roots)?;
    emit::emit(&sched)
}
