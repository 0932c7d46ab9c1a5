//! Chunk boundary detection for combined inputs
//!
//! [`MarkerScanner`] splits an input on the literal [`CHUNK_SEPARATOR`].
//! Compressed data is effectively random, so a chunk can contain the
//! separator by chance; such a chunk is cut short and later fails to decode.
//! [`LengthPrefixedReader`] reads the length-prefixed framing, which has no
//! such failure mode.

use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Separator written after every chunk in marker-framed combined output
pub const CHUNK_SEPARATOR: &[u8] = b"_cHuNK_";

/// Tokens shorter than this are discarded as noise
///
/// The smallest LZ4 frame (header and end mark) is 11 bytes.
pub const MIN_TOKEN_LEN: usize = 11;

const READ_BLOCK_SIZE: usize = 64 * 1024;

/// A sequence of compressed chunks read front to back
pub trait ChunkSource {
    /// Replace the contents of `buf` with the next chunk
    ///
    /// Returns the input offset of the chunk, or `None` once the input is
    /// exhausted.
    fn next_chunk(&mut self, buf: &mut Vec<u8>) -> Result<Option<u64>>;

    /// Number of candidate chunks dropped so far
    fn discarded(&self) -> u64 {
        0
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    if CHUNK_SEPARATOR.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(CHUNK_SEPARATOR.len())
        .position(|window| window == CHUNK_SEPARATOR)
}

pub(crate) fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

/// Splits an input on [`CHUNK_SEPARATOR`] using a bounded sliding window
pub struct MarkerScanner<R> {
    reader: R,
    source: PathBuf,
    window: Vec<u8>,
    /// Start of unconsumed bytes in `window`
    start: usize,
    /// No separator begins in `window[start..searched]`
    searched: usize,
    /// Input offset of `window[0]`
    window_offset: u64,
    max_buffer: usize,
    eof: bool,
    discarded: u64,
}

impl<R: Read> MarkerScanner<R> {
    /// Scanner that fails once a chunk outgrows `max_buffer` bytes
    pub fn new(reader: R, max_buffer: usize) -> Self {
        Self {
            reader,
            source: PathBuf::from("<input>"),
            window: Vec::new(),
            start: 0,
            searched: 0,
            window_offset: 0,
            max_buffer,
            eof: false,
            discarded: 0,
        }
    }

    /// Name the input in error messages
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Read more input into the window, dropping consumed bytes first
    fn fill(&mut self) -> Result<()> {
        if self.start > 0 {
            self.window.drain(..self.start);
            self.window_offset += self.start as u64;
            self.searched -= self.start;
            self.start = 0;
        }

        let pending = self.window.len();
        if pending >= self.max_buffer {
            // A full window is still a valid final token if the input ends here.
            let mut peek = [0u8; 1];
            let n = read_retrying(&mut self.reader, &mut peek)
                .map_err(|e| Error::io(&self.source, e))?;
            if n == 0 {
                self.eof = true;
                return Ok(());
            }
            return Err(Error::ScanBufferOverflow {
                offset: self.window_offset,
                limit: self.max_buffer,
            });
        }

        let want = READ_BLOCK_SIZE.min(self.max_buffer - pending);
        self.window.resize(pending + want, 0);
        let n = match read_retrying(&mut self.reader, &mut self.window[pending..]) {
            Ok(n) => n,
            Err(e) => {
                self.window.truncate(pending);
                return Err(Error::io(&self.source, e));
            }
        };
        self.window.truncate(pending + n);
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }

    /// Copy `window[from..to]` into `buf` unless it is too short to be a chunk
    fn emit(&mut self, from: usize, to: usize, buf: &mut Vec<u8>) -> Option<u64> {
        let offset = self.window_offset + from as u64;
        let len = to - from;
        if len < MIN_TOKEN_LEN {
            if len > 0 {
                warn!("Discarding {} byte token at offset {}", len, offset);
            }
            self.discarded += 1;
            return None;
        }

        buf.clear();
        buf.extend_from_slice(&self.window[from..to]);
        trace!("Token of {} bytes at offset {}", len, offset);
        Some(offset)
    }
}

impl<R: Read> ChunkSource for MarkerScanner<R> {
    fn next_chunk(&mut self, buf: &mut Vec<u8>) -> Result<Option<u64>> {
        loop {
            let from = self.searched.max(self.start);
            if let Some(pos) = find_separator(&self.window[from..]) {
                let end = from + pos;
                let begin = self.start;
                self.start = end + CHUNK_SEPARATOR.len();
                self.searched = self.start;
                if let Some(offset) = self.emit(begin, end, buf) {
                    return Ok(Some(offset));
                }
                continue;
            }

            // A separator may still straddle the end of the window.
            self.searched = self
                .window
                .len()
                .saturating_sub(CHUNK_SEPARATOR.len() - 1)
                .max(self.start);

            if self.eof {
                if self.start == self.window.len() {
                    return Ok(None);
                }
                let (begin, end) = (self.start, self.window.len());
                self.start = end;
                self.searched = end;
                if let Some(offset) = self.emit(begin, end, buf) {
                    return Ok(Some(offset));
                }
                continue;
            }

            self.fill()?;
        }
    }

    fn discarded(&self) -> u64 {
        self.discarded
    }
}

/// Reads chunks written as `u64` little-endian length followed by the bytes
pub struct LengthPrefixedReader<R> {
    reader: R,
    source: PathBuf,
    offset: u64,
    max_buffer: usize,
}

impl<R: Read> LengthPrefixedReader<R> {
    /// Reader rejecting frames larger than `max_buffer` bytes
    pub fn new(reader: R, max_buffer: usize) -> Self {
        Self {
            reader,
            source: PathBuf::from("<input>"),
            offset: 0,
            max_buffer,
        }
    }

    /// Name the input in error messages
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    fn read_length(&mut self) -> Result<Option<u64>> {
        let mut header = [0u8; 8];
        let mut filled = 0;
        while filled < header.len() {
            let n = read_retrying(&mut self.reader, &mut header[filled..])
                .map_err(|e| Error::io(&self.source, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        match filled {
            0 => Ok(None),
            8 => Ok(Some(u64::from_le_bytes(header))),
            partial => Err(Error::TruncatedFrame {
                offset: self.offset,
                expected: 8,
                actual: partial as u64,
            }),
        }
    }
}

impl<R: Read> ChunkSource for LengthPrefixedReader<R> {
    fn next_chunk(&mut self, buf: &mut Vec<u8>) -> Result<Option<u64>> {
        let Some(len) = self.read_length()? else {
            return Ok(None);
        };

        let frame_offset = self.offset;
        if len > self.max_buffer as u64 {
            return Err(Error::ScanBufferOverflow {
                offset: frame_offset,
                limit: self.max_buffer,
            });
        }

        buf.clear();
        let got = (&mut self.reader)
            .take(len)
            .read_to_end(buf)
            .map_err(|e| Error::io(&self.source, e))? as u64;
        if got < len {
            return Err(Error::TruncatedFrame {
                offset: frame_offset,
                expected: len,
                actual: got,
            });
        }

        self.offset += 8 + len;
        trace!("Frame of {} bytes at offset {}", len, frame_offset);
        Ok(Some(frame_offset))
    }
}
