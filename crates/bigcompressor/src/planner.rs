//! Partitioning of walked entries into size-bounded chunks

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::walker::Entry;

/// An ordered group of entries compressed as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of the chunk in the output, starting at 0
    pub index: usize,
    /// Entries in archive order
    pub entries: Vec<Entry>,
    /// Sum of regular file sizes in the chunk
    pub total_size: u64,
}

impl Chunk {
    const fn new(index: usize) -> Self {
        Self {
            index,
            entries: Vec::new(),
            total_size: 0,
        }
    }

    /// Number of regular files in the chunk
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_dir).count()
    }

    /// Whether the chunk holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: Entry) {
        self.total_size += entry.size;
        self.entries.push(entry);
    }
}

/// Split `entries` into chunks of at most `threshold` file bytes
///
/// An entry that would push the running total past `threshold` starts a
/// new chunk, so a chunk only exceeds the threshold when a single file is
/// larger than it. Files are never split. Directory entries are held back
/// and placed in the chunk that receives the next file, keeping a directory
/// header together with its first child.
///
/// An empty walk produces a single empty chunk.
pub fn plan_chunks<I>(entries: I, threshold: u64) -> Result<Vec<Chunk>>
where
    I: IntoIterator<Item = Result<Entry>>,
{
    let mut chunks = Vec::new();
    let mut current = Chunk::new(0);
    let mut pending_dirs = Vec::new();

    for entry in entries {
        let entry = entry?;
        if entry.is_dir {
            pending_dirs.push(entry);
            continue;
        }

        let fits = current.total_size.saturating_add(entry.size) <= threshold;
        if !fits && !current.is_empty() {
            let next = Chunk::new(current.index + 1);
            chunks.push(std::mem::replace(&mut current, next));
        }

        for dir in pending_dirs.drain(..) {
            current.push(dir);
        }
        current.push(entry);
    }

    for dir in pending_dirs {
        current.push(dir);
    }
    chunks.push(current);

    debug!(
        "Planned {} chunks with threshold {} bytes",
        chunks.len(),
        threshold
    );
    Ok(chunks)
}
