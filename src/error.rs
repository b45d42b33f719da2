//! Centralized error handling for Tabwire.
//!
//! All failure conditions are propagated through the crate-local [`Result`]
//! type; the library contains no panicking paths (enforced by
//! `#![deny(clippy::unwrap_used)]` and `#![deny(clippy::panic)]`).
//!
//! ## Error Categories
//!
//! - **Transport** ([`TabwireError::Transport`]): malformed or out-of-sequence
//!   frames, payload bytes outside the alphabet, malformed token streams,
//!   unusable destination names. The pending transfer is discarded; the caller
//!   may retry the whole operation later.
//! - **Integrity** ([`TabwireError::Integrity`]): the checksum trailer did not
//!   match after full reassembly. Same abort behavior as `Transport`,
//!   distinguished only for diagnostics.
//! - **I/O** ([`TabwireError::Io`]): channel or file-system failures.
//! - **Internal** ([`TabwireError::Internal`]): a scheduling invariant was
//!   violated (for example a composite left undefined after the scheduler's
//!   heap drained). This is a logic bug in discovery/scheduling, never a
//!   transient condition, and must not be retried.
//!
//! Errors are `Clone` so they can be stored for later analysis; I/O errors are
//! wrapped in `Arc` to keep cloning cheap.

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Tabwire operations.
pub type Result<T> = std::result::Result<T, TabwireError>;

/// The master error enum covering all failure domains in Tabwire.
///
/// ## Examples
///
/// ```rust
/// use tabwire::TabwireError;
///
/// fn describe(err: &TabwireError) -> &'static str {
///     match err {
///         TabwireError::Transport(_) => "transfer discarded, retry later",
///         TabwireError::Integrity(_) => "checksum mismatch, retry later",
///         TabwireError::Io(_) => "channel or file failure",
///         TabwireError::Internal(_) => "logic bug, please report",
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum TabwireError {
    /// A frame or the reassembled symbol stream violated the transport
    /// contract: wrong tag, unexpected sequence counter, byte outside the
    /// 94-symbol alphabet, truncated or malformed token stream, or an
    /// unusable destination file name.
    Transport(String),

    /// The checksum trailer recomputed over the received symbols did not
    /// match the transmitted trailer.
    Integrity(String),

    /// Low-level I/O failure on the frame channel or the output file.
    ///
    /// Wrapped in an `Arc` to keep the error type `Clone`.
    Io(Arc<io::Error>),

    /// An internal consistency check failed, most importantly a composite
    /// remaining undefined after the definition scheduler exhausted its
    /// heap. Indicates a defect in discovery or scheduling, not bad input.
    Internal(String),
}

impl fmt::Display for TabwireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(s) => write!(f, "Transport Error: {s}"),
            Self::Integrity(s) => write!(f, "Integrity Error: {s}"),
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for TabwireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for TabwireError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
