//! Tools for inspecting a captured transfer.
//! Useful for debugging channel capacity and literal-rendering choices.

use serde::Serialize;

use crate::api::Receiver;
use crate::error::Result;

/// A structural report of one captured transfer.
#[derive(Debug, Serialize)]
pub struct TransferReport {
    /// Frames in the capture, the terminating frame included.
    pub frames: usize,
    /// Payload symbols carried (checksum trailer excluded).
    pub symbols: usize,
    /// Composite nodes in the rebuilt graph, root container included.
    pub composites: usize,
    /// Final size of the known-value pool, sentinels included.
    pub pool_entries: usize,
    /// Destination file name carried by the transfer.
    pub file_name: String,
    /// Statement count of the rendered regeneration program.
    pub script_lines: usize,
    /// Byte length of the rendered regeneration program.
    pub script_bytes: usize,
}

/// The transfer inspector tool.
#[derive(Debug)]
pub struct TransferInspector;

impl TransferInspector {
    /// Replays captured frame lines through the full inbound pipeline and
    /// summarizes what they carry.
    pub fn inspect<'a, I>(frames: I) -> Result<TransferReport>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut receiver = Receiver::new();
        let mut count = 0usize;
        for line in frames {
            count += 1;
            receiver.feed(line)?;
        }
        let symbols = receiver.symbol_count();
        let inbound = receiver.finish()?;
        let script = inbound.script()?;

        Ok(TransferReport {
            frames: count,
            symbols,
            composites: inbound.arena().len(),
            pool_entries: inbound.pool_entries(),
            file_name: inbound.file_name().to_owned(),
            script_lines: script.lines().count(),
            script_bytes: script.len(),
        })
    }
}
