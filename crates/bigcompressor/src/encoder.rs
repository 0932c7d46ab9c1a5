//! Serialization of one chunk into a compressed tar stream

use std::fs::File;
use std::io::{self, Read, Take};
use tar::{EntryType, Header};
use tracing::{debug, trace};

use crate::codec::{Codec, CodecWriter};
use crate::error::{Error, Result};
use crate::planner::Chunk;
use crate::walker::Entry;

/// Reader yielding exactly `len` bytes of a source file
///
/// The archive header is written before the content, so a file that
/// shrank after the walk must fail instead of producing a short entry.
struct ExactReader<R> {
    inner: Take<R>,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, len: u64) -> Self {
        Self {
            inner: inner.take(len),
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && self.inner.limit() > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended {} bytes before its recorded size",
                    self.inner.limit()
                ),
            ));
        }
        Ok(n)
    }
}

fn entry_header(entry: &Entry) -> Header {
    let mut header = Header::new_gnu();
    if entry.is_dir {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
    } else {
        header.set_entry_type(EntryType::Regular);
        header.set_size(entry.size);
    }
    header.set_mode(entry.mode);
    header.set_mtime(0);
    header
}

fn append_entry<W: io::Write>(builder: &mut tar::Builder<W>, entry: &Entry) -> io::Result<()> {
    let mut header = entry_header(entry);
    if entry.is_dir {
        builder.append_data(&mut header, &entry.relative, io::empty())
    } else {
        let file = File::open(&entry.source)?;
        builder.append_data(
            &mut header,
            &entry.relative,
            ExactReader::new(file, entry.size),
        )
    }
}

/// Encode `chunk` into `buffer` as a tar stream compressed with `codec`
///
/// `buffer` is cleared first and keeps its allocation. On error its
/// contents are unspecified and must be discarded by the caller.
pub fn encode_chunk(chunk: &Chunk, codec: Codec, buffer: &mut Vec<u8>) -> Result<()> {
    buffer.clear();

    let mut builder = tar::Builder::new(CodecWriter::new(codec, &mut *buffer));
    builder.follow_symlinks(false);

    for entry in &chunk.entries {
        trace!(
            "Chunk {}: archiving {}",
            chunk.index,
            entry.relative.display()
        );
        append_entry(&mut builder, entry).map_err(|source| Error::Archive {
            chunk: chunk.index,
            path: entry.source.clone(),
            source,
        })?;
    }

    // The tar trailer has to reach the compressor before the compressor is finished.
    let writer = builder.into_inner().map_err(|e| Error::Compression {
        chunk: chunk.index,
        message: format!("failed to write archive trailer: {e}"),
    })?;
    writer.finish().map_err(|e| Error::Compression {
        chunk: chunk.index,
        message: e.to_string(),
    })?;

    debug!(
        "Encoded chunk {}: {} entries, {} bytes -> {} bytes ({})",
        chunk.index,
        chunk.entries.len(),
        chunk.total_size,
        buffer.len(),
        codec.name()
    );
    Ok(())
}
