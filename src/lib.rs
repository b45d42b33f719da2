//! # Tabwire
//!
//! A codec and transport for arbitrary in-memory data graphs over a narrow,
//! line-oriented text channel.
//!
//! ## Overview
//!
//! Tabwire moves a possibly cyclic, possibly shared graph of numbers,
//! strings, booleans and key/value containers across a channel that only
//! carries short text lines. Instead of flattening the data into a blob, it
//! streams the graph structurally and regenerates it on the far side as a
//! small, deterministic, human-auditable program that rebuilds the exact
//! graph, shared references and cycles included.
//!
//! ### Key Properties
//!
//! *   **Structure-preserving:** Sharing and cycles survive the round trip;
//!     `decode(encode(G))` is graph-isomorphic to `G`.
//! *   **Bit-exact numbers:** Every double, including NaN, signed zero,
//!     infinities and subnormals, is carried and rendered bit-exactly
//!     through pure integer arithmetic.
//! *   **Narrow-channel safe:** Only 94 printable symbols appear on the
//!     wire, packed into tagged, sequence-counted frames with a checksum
//!     trailer. Any violation discards the whole transfer; no partial
//!     graph is ever observable.
//! *   **Auditable output:** The receiving side can render the graph as a
//!     minimal program of definition, assignment and return statements;
//!     identical graphs always render to identical text.
//!
//! ## Architecture
//!
//! The sending side is `graph → symbol stream → frames`: [`wire`] walks the
//! composites through a worklist, [`codec`] turns scalars and
//! back-references into symbols, and [`frame::FrameWriter`] packs them into
//! checksummed frames. The receiving side reverses the pipeline through the
//! resumable [`Receiver`] state machine, then [`script`] renders the
//! regeneration program in three passes (discovery, scheduling, emission).
//!
//! Both sides maintain a pool of already-seen values in identical
//! first-appearance order, so repeated scalars and shared nodes cost a
//! short back-reference instead of a re-encoding.
//!
//! ## Usage
//!
//! ```
//! use tabwire::{Arena, Receiver, Tabwire, Value};
//!
//! // Build a graph with a cycle.
//! let mut arena = Arena::new();
//! let node = arena.add_node();
//! arena.insert(node, Value::str("name"), Value::str("loop"));
//! arena.insert(node, Value::str("me"), Value::Node(node));
//!
//! // Send it over an in-memory channel.
//! let mut channel: Vec<String> = Vec::new();
//! Tabwire::send(&mut arena, Value::Node(node), "state.lua", &mut channel)?;
//!
//! // Receive and regenerate.
//! let mut receiver = Receiver::new();
//! for line in &channel {
//!     receiver.feed(line)?;
//! }
//! let inbound = receiver.finish()?;
//! let program = inbound.script()?;
//! assert!(program.ends_with("return a\n"));
//! # Ok::<(), tabwire::TabwireError>(())
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **No Unsafe:** The crate is `#![deny(unsafe_code)]`.
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library
//!   (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a
//!   [`TabwireError`] category; transport and integrity failures are
//!   retried by resending the whole transfer, internal ones never are.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod error;
pub mod frame;
pub mod inspector;
pub mod script;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod alphabet;
#[doc(hidden)]
pub mod checksum;
#[doc(hidden)]
pub mod codec;
#[doc(hidden)]
pub mod wire;

#[cfg(feature = "json")]
mod json;

// --- RE-EXPORTS ---

pub use api::{Inbound, Receiver, Tabwire};
pub use error::{Result, TabwireError};
pub use frame::{FeedProgress, FrameChannel};
pub use inspector::{TransferInspector, TransferReport};
pub use value::{Arena, NodeId, Value};
