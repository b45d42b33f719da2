//! The transport framer.
//!
//! The outgoing symbol stream is split into tagged, sequence-counted text
//! frames; the incoming side reassembles them through a resumable
//! feed/finish state machine and fails closed on any violation.
//!
//! ## Frame shape
//!
//! `"TW1"` + sequence character + payload bytes + `'\n'`
//!
//! The sequence character is `'*'` for the first frame, then the decimal
//! digits `1..9,0,1,...` cycling modulo 10 for gap and duplication
//! detection. The 7-symbol checksum trailer rides after the final frame's
//! payload, and an empty-payload frame terminates the transfer.

use crate::alphabet::{symbol_to_wire, wire_to_symbol};
use crate::checksum::{StreamDigest, TRAILER_LEN};
use crate::error::{Result, TabwireError};

/// Literal tag opening every frame of format version 1.
pub const FRAME_TAG: &str = "TW1";

/// Sequence marker distinguishing the first frame.
pub const FIRST_MARK: char = '*';

/// Maximum payload symbols per frame. The final frame may exceed this by
/// the trailer length.
pub const MAX_FRAME_SYMBOLS: usize = 240;

/// One blocking send per outbound frame.
///
/// This is the whole interface to the external message channel; on failure
/// the transfer is abandoned, there are no partial-frame retries.
pub trait FrameChannel {
    /// Sends one complete frame, including its line terminator.
    fn send(&mut self, frame: &str) -> Result<()>;
}

/// In-memory channel used by tests and demos.
impl FrameChannel for Vec<String> {
    fn send(&mut self, frame: &str) -> Result<()> {
        self.push(frame.to_owned());
        Ok(())
    }
}

fn seq_char(frame_index: u64) -> char {
    if frame_index == 0 {
        FIRST_MARK
    } else {
        char::from(b'0' + (frame_index % 10) as u8)
    }
}

/// Splits a symbol stream into frames and drives the outbound channel.
#[derive(Debug)]
pub struct FrameWriter<'c, C: FrameChannel> {
    channel: &'c mut C,
    pending: Vec<u8>,
    digest: StreamDigest,
    frames_sent: u64,
}

impl<'c, C: FrameChannel> FrameWriter<'c, C> {
    /// Creates a writer over an outbound channel.
    pub fn new(channel: &'c mut C) -> Self {
        Self {
            channel,
            pending: Vec::new(),
            digest: StreamDigest::new(),
            frames_sent: 0,
        }
    }

    /// Queues symbols for transmission, flushing full frames as they fill.
    pub fn push(&mut self, symbols: &[u8]) -> Result<()> {
        self.digest.update_all(symbols);
        self.pending.extend_from_slice(symbols);
        while self.pending.len() >= MAX_FRAME_SYMBOLS {
            let rest = self.pending.split_off(MAX_FRAME_SYMBOLS);
            let full = std::mem::replace(&mut self.pending, rest);
            self.send_frame(&full)?;
        }
        Ok(())
    }

    /// Appends the checksum trailer, flushes the final payload frame and the
    /// empty terminating frame.
    pub fn finish(mut self) -> Result<u64> {
        let trailer = self.digest.trailer();
        self.pending.extend_from_slice(&trailer);
        let last = std::mem::take(&mut self.pending);
        self.send_frame(&last)?;
        self.send_frame(&[])?;
        log::debug!("transfer sent in {} frames", self.frames_sent);
        Ok(self.frames_sent)
    }

    fn send_frame(&mut self, symbols: &[u8]) -> Result<()> {
        let mut frame = String::with_capacity(FRAME_TAG.len() + 2 + symbols.len());
        frame.push_str(FRAME_TAG);
        frame.push(seq_char(self.frames_sent));
        for &s in symbols {
            frame.push(char::from(symbol_to_wire(s)));
        }
        frame.push('\n');
        self.channel.send(&frame)?;
        self.frames_sent += 1;
        Ok(())
    }
}

/// Outcome of feeding one frame to a [`FrameReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedProgress {
    /// More frames are expected.
    More,
    /// The terminating frame arrived and the checksum verified.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Receiving,
    Complete,
    Failed,
}

/// Reassembles the inbound symbol stream one frame at a time.
///
/// Accepts frames only while each arrives with the expected tag and
/// sequence counter. On any violation the entire pending transfer is
/// discarded and every later call fails: no partial graph is ever visible.
#[derive(Debug)]
pub struct FrameReader {
    symbols: Vec<u8>,
    next_frame: u64,
    state: ReaderState,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Creates a reader awaiting the first frame.
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            next_frame: 0,
            state: ReaderState::Receiving,
        }
    }

    /// Feeds one inbound frame (with or without its line terminator).
    pub fn feed(&mut self, line: &str) -> Result<FeedProgress> {
        match self.state {
            ReaderState::Receiving => {}
            ReaderState::Complete => {
                return Err(self.discard(TabwireError::Transport(
                    "frame received after end of transfer".into(),
                )));
            }
            ReaderState::Failed => {
                return Err(TabwireError::Transport(
                    "transfer already discarded".into(),
                ));
            }
        }

        let line = line.strip_suffix('\n').unwrap_or(line);
        let bytes = line.as_bytes();
        if bytes.len() < FRAME_TAG.len() + 1 || &bytes[..FRAME_TAG.len()] != FRAME_TAG.as_bytes() {
            return Err(self.discard(TabwireError::Transport(format!(
                "frame does not start with tag {FRAME_TAG:?}"
            ))));
        }
        let seq = bytes[FRAME_TAG.len()];
        let expected = seq_char(self.next_frame);
        if seq != expected as u8 {
            return Err(self.discard(TabwireError::Transport(format!(
                "sequence counter {:?} does not match expected {expected:?}",
                char::from(seq)
            ))));
        }

        let payload = &bytes[FRAME_TAG.len() + 1..];
        if payload.is_empty() {
            return self.finalize();
        }
        for &b in payload {
            match wire_to_symbol(b) {
                Ok(s) => self.symbols.push(s),
                Err(e) => return Err(self.discard(e)),
            }
        }
        self.next_frame += 1;
        Ok(FeedProgress::More)
    }

    /// Recomputes the checksum over the non-trailer symbols and strips the
    /// trailer on success.
    fn finalize(&mut self) -> Result<FeedProgress> {
        if self.symbols.len() < TRAILER_LEN {
            return Err(self.discard(TabwireError::Transport(
                "stream shorter than the checksum trailer".into(),
            )));
        }
        let body_len = self.symbols.len() - TRAILER_LEN;
        let mut digest = StreamDigest::new();
        digest.update_all(&self.symbols[..body_len]);
        if let Err(e) = digest.verify(&self.symbols[body_len..]) {
            return Err(self.discard(e));
        }
        self.symbols.truncate(body_len);
        self.state = ReaderState::Complete;
        Ok(FeedProgress::Complete)
    }

    fn discard(&mut self, err: TabwireError) -> TabwireError {
        log::warn!("discarding pending transfer: {err}");
        self.state = ReaderState::Failed;
        self.symbols.clear();
        err
    }

    /// Returns true once the terminating frame has been accepted.
    pub fn is_complete(&self) -> bool {
        self.state == ReaderState::Complete
    }

    /// Number of payload symbols received so far (trailer excluded once
    /// complete).
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Consumes the reader, yielding the verified symbol stream.
    pub fn into_symbols(self) -> Result<Vec<u8>> {
        match self.state {
            ReaderState::Complete => Ok(self.symbols),
            _ => Err(TabwireError::Transport(
                "transfer incomplete: terminating frame not received".into(),
            )),
        }
    }
}
