//! The high-level transfer surface: one call to send a graph, a resumable
//! state machine to receive one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TabwireError};
use crate::frame::{FeedProgress, FrameChannel, FrameReader, FrameWriter};
use crate::script;
use crate::value::{Arena, Value};
use crate::wire;

/// Entry point of the sending side.
#[derive(Debug)]
pub struct Tabwire;

impl Tabwire {
    /// Streams `payload` and its destination `file_name` over `channel`.
    ///
    /// A root container node is added to `arena` holding the payload and
    /// the file name as its two array entries; the graph reachable from it
    /// is then encoded, framed and checksummed. Returns the number of
    /// frames sent, the empty terminating frame included.
    ///
    /// # Example
    ///
    /// ```
    /// use tabwire::{Arena, Tabwire, Value};
    ///
    /// let mut arena = Arena::new();
    /// let node = arena.add_node();
    /// arena.insert(node, Value::str("answer"), Value::Number(42.0));
    ///
    /// let mut channel: Vec<String> = Vec::new();
    /// let frames = Tabwire::send(&mut arena, Value::Node(node), "out.lua", &mut channel)?;
    /// assert_eq!(frames as usize, channel.len());
    /// # Ok::<(), tabwire::TabwireError>(())
    /// ```
    pub fn send<C: FrameChannel>(
        arena: &mut Arena,
        payload: Value,
        file_name: &str,
        channel: &mut C,
    ) -> Result<u64> {
        validate_file_name(file_name)?;
        let root = arena.add_node();
        arena.insert(root, Value::Number(1.0), payload);
        arena.insert(root, Value::Number(2.0), Value::str(file_name));

        let symbols = wire::encode(arena, root)?;
        let mut writer = FrameWriter::new(channel);
        writer.push(&symbols)?;
        writer.finish()
    }
}

/// The resumable inbound side: feed frames as they arrive, then finish.
///
/// Any feed error discards the pending transfer; nothing partial is ever
/// observable.
#[derive(Debug, Default)]
pub struct Receiver {
    reader: FrameReader,
}

impl Receiver {
    /// Creates a receiver awaiting the first frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound frame line.
    pub fn feed(&mut self, line: &str) -> Result<FeedProgress> {
        self.reader.feed(line)
    }

    /// Payload symbols received so far.
    pub fn symbol_count(&self) -> usize {
        self.reader.symbol_count()
    }

    /// Completes the transfer: decodes the verified symbol stream and
    /// unpacks the root container.
    pub fn finish(self) -> Result<Inbound> {
        let symbols = self.reader.into_symbols()?;
        let decoded = wire::decode(&symbols)?;

        let payload = decoded
            .arena
            .get(decoded.root, &Value::Number(1.0))
            .cloned()
            .ok_or_else(|| {
                TabwireError::Transport("root container missing its payload entry".into())
            })?;
        let name = decoded
            .arena
            .get(decoded.root, &Value::Number(2.0))
            .cloned()
            .ok_or_else(|| {
                TabwireError::Transport("root container missing its file-name entry".into())
            })?;
        let Value::Str(bytes) = name else {
            return Err(TabwireError::Transport(format!(
                "destination file name is a {}, not a string",
                name.kind()
            )));
        };
        let file_name = String::from_utf8(bytes).map_err(|_| {
            TabwireError::Transport("destination file name is not valid UTF-8".into())
        })?;
        validate_file_name(&file_name)?;

        Ok(Inbound {
            arena: decoded.arena,
            payload,
            file_name,
            pool_len: decoded.pool_len,
        })
    }
}

/// A completed inbound transfer.
#[derive(Debug)]
pub struct Inbound {
    arena: Arena,
    payload: Value,
    file_name: String,
    pool_len: usize,
}

impl Inbound {
    /// The rebuilt graph.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The transferred payload value.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The destination file name carried by the transfer.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Final known-value-pool size, for inspection.
    pub fn pool_entries(&self) -> usize {
        self.pool_len
    }

    /// Renders the regeneration program for the payload.
    pub fn script(&self) -> Result<String> {
        script::generate(&self.arena, std::slice::from_ref(&self.payload))
    }

    /// Writes the regeneration program into `dir` under the transferred
    /// file name and returns the full path.
    pub fn write_script(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        let text = self.script()?;
        fs::write(&path, text)?;
        log::debug!("wrote regeneration program to {}", path.display());
        Ok(path)
    }
}

/// File names ride inside transfers and name a file in a caller-chosen
/// directory; they must be plain names, never paths.
fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TabwireError::Transport(
            "empty destination file name".into(),
        ));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(TabwireError::Transport(format!(
            "destination file name {name:?} contains a path component"
        )));
    }
    Ok(())
}
