//! Compress and decompress sessions
//!
//! A [`BigCompressor`] owns the chunk buffer and copy buffer reused across
//! every chunk of one operation. Methods take `&mut self`, so a session
//! cannot run two operations at once; concurrent work needs one session
//! per operation.
//!
//! # Example
//!
//! ```no_run
//! use bigcompressor::{BigCompressor, CompressorConfig};
//!
//! let config = CompressorConfig::default().with_max_chunk_size(16 * 1024 * 1024);
//! let mut session = BigCompressor::new(config)?;
//!
//! let report = session.compress("data/photos", "backup/photos.bc")?;
//! println!("{} chunks, {} bytes", report.chunks, report.bytes_out);
//!
//! session.decompress("backup/photos.bc", "restore/photos")?;
//! # Ok::<(), bigcompressor::Error>(())
//! ```

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, info_span};

use crate::config::{CompressorConfig, Framing};
use crate::decoder::{ArchivedEntry, list_chunk, replay_chunk};
use crate::encoder::encode_chunk;
use crate::error::{Error, Result};
use crate::planner::{Chunk, plan_chunks};
use crate::scanner::{ChunkSource, LengthPrefixedReader, MarkerScanner};
use crate::walker::walk;
use crate::writer::{ChunkWriter, chunk_file_name};

/// Summary of a compress operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompressionReport {
    /// Chunks written
    pub chunks: u64,
    /// Regular files archived
    pub files: u64,
    /// Directories archived
    pub directories: u64,
    /// Symlinks and special files left out
    pub skipped: u64,
    /// Uncompressed file bytes read
    pub bytes_in: u64,
    /// Bytes written to disk, framing included
    pub bytes_out: u64,
}

/// Summary of a decompress operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecompressionReport {
    /// Chunks decoded
    pub chunks: u64,
    /// Regular files written
    pub files: u64,
    /// File content bytes written
    pub bytes: u64,
    /// Candidate chunks dropped as too short
    pub discarded: u64,
}

/// Entries of one chunk as reported by [`BigCompressor::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkListing {
    /// Position of the chunk in the input
    pub index: usize,
    /// Input offset of the chunk
    pub offset: u64,
    /// Compressed size of the chunk
    pub compressed_size: u64,
    /// Archived entries in order
    pub entries: Vec<ArchivedEntry>,
}

/// A compression session
#[derive(Debug)]
pub struct BigCompressor {
    config: CompressorConfig,
    /// Compressed bytes of the chunk in flight
    buffer: Vec<u8>,
    copy_buf: Vec<u8>,
}

impl BigCompressor {
    /// Create a session after validating `config`
    pub fn new(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        let copy_buf = vec![0u8; config.copy_buffer_size];
        Ok(Self {
            config,
            buffer: Vec::new(),
            copy_buf,
        })
    }

    /// Session configuration
    pub const fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Walk `src` and return the chunk plan without encoding anything
    pub fn plan(&self, src: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        plan_chunks(walk(src), self.config.max_chunk_size)
    }

    /// Compress the tree below `src` into `dst`
    ///
    /// In combined mode `dst` is a single file; otherwise one file per chunk
    /// is written to `dst_0`, `dst_1`, ... Parent directories of `dst` are
    /// created. Output already written stays in place on failure.
    pub fn compress(
        &mut self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
    ) -> Result<CompressionReport> {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let span = info_span!("compress", src = %src.display(), dst = %dst.display());
        let _guard = span.enter();

        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut walk = walk(src);
        let chunks = plan_chunks(walk.by_ref(), self.config.max_chunk_size)?;
        let mut report = CompressionReport {
            skipped: walk.skipped(),
            ..CompressionReport::default()
        };

        let mut writer = if self.config.combine_chunks {
            ChunkWriter::combined(dst, self.config.framing)?
        } else {
            ChunkWriter::split(dst)
        };

        for chunk in &chunks {
            let result = encode_chunk(chunk, self.config.codec, &mut self.buffer)
                .and_then(|()| writer.write_chunk(chunk.index, &self.buffer));
            self.buffer.clear();
            report.bytes_out += result?;

            report.chunks += 1;
            report.files += chunk.file_count() as u64;
            report.directories += (chunk.entries.len() - chunk.file_count()) as u64;
            report.bytes_in += chunk.total_size;
        }
        writer.finish()?;

        info!(
            "Compressed {} files in {} chunks: {} bytes -> {} bytes",
            report.files, report.chunks, report.bytes_in, report.bytes_out
        );
        Ok(report)
    }

    /// Restore the files stored in `src` below `dst`
    ///
    /// `src` is either a combined file or a single per-chunk file; it is read
    /// with the configured framing. Decoding stops at the first failing chunk.
    pub fn decompress(
        &mut self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
    ) -> Result<DecompressionReport> {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let span = info_span!("decompress", src = %src.display(), dst = %dst.display());
        let _guard = span.enter();

        let mut source = self.open_source(src)?;
        let mut report = DecompressionReport::default();
        self.replay_all(source.as_mut(), dst, &mut report)?;
        report.discarded = source.discarded();

        info!(
            "Decompressed {} chunks: {} files, {} bytes",
            report.chunks, report.files, report.bytes
        );
        Ok(report)
    }

    /// Restore per-chunk outputs `prefix_0`, `prefix_1`, ... below `dst`
    ///
    /// Chunks are read in index order until the first missing index.
    pub fn decompress_split(
        &mut self,
        prefix: impl AsRef<Path>,
        dst: impl AsRef<Path>,
    ) -> Result<DecompressionReport> {
        let (prefix, dst) = (prefix.as_ref(), dst.as_ref());
        let span = info_span!("decompress_split", prefix = %prefix.display());
        let _guard = span.enter();

        let mut report = DecompressionReport::default();
        for index in 0.. {
            let path = chunk_file_name(prefix, index);
            if index > 0 && !path.is_file() {
                break;
            }

            self.buffer.clear();
            let mut file = File::open(&path).map_err(|e| Error::io(&path, e))?;
            file.read_to_end(&mut self.buffer)
                .map_err(|e| Error::io(&path, e))?;

            let result = replay_chunk(index, &self.buffer, dst, &mut self.copy_buf);
            self.buffer.clear();
            let stats = result?;
            report.chunks += 1;
            report.files += stats.files;
            report.bytes += stats.bytes;
        }

        info!(
            "Decompressed {} chunk files: {} files, {} bytes",
            report.chunks, report.files, report.bytes
        );
        Ok(report)
    }

    /// List the entries of every chunk in `src` without extracting
    pub fn list(&mut self, src: impl AsRef<Path>) -> Result<Vec<ChunkListing>> {
        let src = src.as_ref();
        let mut source = self.open_source(src)?;
        let mut listings = Vec::new();

        let result = self.list_all(source.as_mut(), &mut listings);
        self.buffer.clear();
        result?;
        Ok(listings)
    }

    fn list_all(
        &mut self,
        source: &mut dyn ChunkSource,
        listings: &mut Vec<ChunkListing>,
    ) -> Result<()> {
        while let Some(offset) = source.next_chunk(&mut self.buffer)? {
            let index = listings.len();
            let entries = list_chunk(index, &self.buffer)?;
            listings.push(ChunkListing {
                index,
                offset,
                compressed_size: self.buffer.len() as u64,
                entries,
            });
        }
        Ok(())
    }

    fn open_source(&self, src: &Path) -> Result<Box<dyn ChunkSource>> {
        let file = File::open(src).map_err(|e| Error::io(src, e))?;
        let reader = BufReader::new(file);
        let limit = self.config.max_scan_buffer;
        Ok(match self.config.framing {
            Framing::Marker => Box::new(MarkerScanner::new(reader, limit).with_source(src)),
            Framing::LengthPrefixed => {
                Box::new(LengthPrefixedReader::new(reader, limit).with_source(src))
            }
        })
    }

    fn replay_all(
        &mut self,
        source: &mut dyn ChunkSource,
        dst: &Path,
        report: &mut DecompressionReport,
    ) -> Result<()> {
        let mut index = 0;
        while let Some(offset) = source.next_chunk(&mut self.buffer)? {
            debug!(
                "Decoding chunk {} ({} bytes at offset {})",
                index,
                self.buffer.len(),
                offset
            );
            let result = replay_chunk(index, &self.buffer, dst, &mut self.copy_buf);
            self.buffer.clear();
            let stats = result?;

            report.chunks += 1;
            report.files += stats.files;
            report.bytes += stats.bytes;
            index += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_config_rejected() {
        let config = CompressorConfig::default().with_max_chunk_size(0);
        assert!(matches!(
            BigCompressor::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_report_counts() {
        let src = TempDir::new().unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/one"), vec![1u8; 300]).unwrap();
        fs::write(src.path().join("two"), vec![2u8; 300]).unwrap();

        let out = TempDir::new().unwrap();
        let mut session =
            BigCompressor::new(CompressorConfig::default().with_max_chunk_size(400)).unwrap();
        let report = session.compress(src.path(), out.path().join("out.bc")).unwrap();

        assert_eq!(report.chunks, 2);
        assert_eq!(report.files, 2);
        assert_eq!(report.directories, 1);
        assert_eq!(report.bytes_in, 600);
        assert_eq!(
            report.bytes_out,
            fs::metadata(out.path().join("out.bc")).unwrap().len()
        );
    }

    #[test]
    fn test_buffer_released_after_failure() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("f"), b"content").unwrap();
        let out = TempDir::new().unwrap();
        let dst = out.path().join("archive.bc");

        let mut session = BigCompressor::new(CompressorConfig::default()).unwrap();
        session.compress(src.path(), &dst).unwrap();

        // Corrupt the codec magic so decoding fails.
        let mut bytes = fs::read(&dst).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&dst, bytes).unwrap();

        let restore = TempDir::new().unwrap();
        assert!(session.decompress(&dst, restore.path()).is_err());
        assert!(session.buffer.is_empty());

        assert!(matches!(
            session.list(&dst),
            Err(Error::UnknownCodec { chunk: 0, .. })
        ));
        assert!(session.buffer.is_empty());
    }
}
