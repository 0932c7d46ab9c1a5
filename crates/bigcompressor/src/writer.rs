//! Persistence of compressed chunks

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::Framing;
use crate::error::{Error, Result};
use crate::scanner::CHUNK_SEPARATOR;

/// Name of the per-chunk output file for `index`: `<prefix>_<index>`
pub fn chunk_file_name(prefix: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!("_{index}"));
    PathBuf::from(name)
}

/// Destination for compressed chunks
pub enum ChunkWriter {
    /// One file per chunk, named by [`chunk_file_name`]
    Split {
        /// Output path prefix
        prefix: PathBuf,
        /// One past the highest chunk index written
        written: usize,
    },
    /// All chunks in one file, delimited by `framing`
    Combined {
        /// Path of the combined file
        path: PathBuf,
        /// Open output
        file: BufWriter<File>,
        /// Delimiting scheme
        framing: Framing,
    },
}

impl ChunkWriter {
    /// Writer producing `<prefix>_0`, `<prefix>_1`, ...
    pub fn split(prefix: impl Into<PathBuf>) -> Self {
        Self::Split {
            prefix: prefix.into(),
            written: 0,
        }
    }

    /// Writer appending every chunk to one file
    ///
    /// The file is created, or truncated if it exists, and held open until
    /// [`ChunkWriter::finish`].
    pub fn combined(path: impl Into<PathBuf>, framing: Framing) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self::Combined {
            path,
            file: BufWriter::new(file),
            framing,
        })
    }

    /// Persist one compressed chunk and return the bytes written to disk
    pub fn write_chunk(&mut self, index: usize, data: &[u8]) -> Result<u64> {
        match self {
            Self::Split { prefix, written } => {
                let path = chunk_file_name(prefix, index);
                let mut file = File::create(&path).map_err(|e| Error::io(&path, e))?;
                file.write_all(data).map_err(|e| Error::io(&path, e))?;
                *written = (*written).max(index + 1);
                trace!("Wrote chunk {} to {}", index, path.display());
                Ok(data.len() as u64)
            }
            Self::Combined {
                path,
                file,
                framing,
            } => {
                let written = match framing {
                    Framing::Marker => {
                        file.write_all(data).map_err(|e| Error::io(&*path, e))?;
                        file.write_all(CHUNK_SEPARATOR)
                            .map_err(|e| Error::io(&*path, e))?;
                        data.len() + CHUNK_SEPARATOR.len()
                    }
                    Framing::LengthPrefixed => {
                        file.write_all(&(data.len() as u64).to_le_bytes())
                            .map_err(|e| Error::io(&*path, e))?;
                        file.write_all(data).map_err(|e| Error::io(&*path, e))?;
                        data.len() + 8
                    }
                };
                trace!("Appended chunk {} ({} bytes) to {}", index, written, path.display());
                Ok(written as u64)
            }
        }
    }

    /// Flush buffered output
    ///
    /// In split mode, chunk files left behind by an earlier run with more
    /// chunks are removed so the index sequence ends at the last chunk
    /// written.
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Split { prefix, written } => {
                let mut index = written;
                loop {
                    let stale = chunk_file_name(&prefix, index);
                    if !stale.is_file() {
                        break;
                    }
                    fs::remove_file(&stale).map_err(|e| Error::io(&stale, e))?;
                    debug!("Removed stale chunk file {}", stale.display());
                    index += 1;
                }
            }
            Self::Combined { path, mut file, .. } => {
                file.flush().map_err(|e| Error::io(&path, e))?;
                debug!("Finished combined output {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_file_name() {
        assert_eq!(
            chunk_file_name(Path::new("out/archive.bc"), 12),
            PathBuf::from("out/archive.bc_12")
        );
    }

    #[test]
    fn test_split_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("data");
        fs::write(dir.path().join("data_0"), b"old content that is longer").unwrap();

        let mut writer = ChunkWriter::split(&prefix);
        writer.write_chunk(0, b"new").unwrap();
        writer.write_chunk(1, b"second").unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read(dir.path().join("data_0")).unwrap(), b"new");
        assert_eq!(fs::read(dir.path().join("data_1")).unwrap(), b"second");
    }

    #[test]
    fn test_split_removes_stale_higher_chunks() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("data");
        for index in 0..4 {
            fs::write(chunk_file_name(&prefix, index), b"previous run").unwrap();
        }
        fs::write(chunk_file_name(&prefix, 6), b"beyond a gap").unwrap();

        let mut writer = ChunkWriter::split(&prefix);
        writer.write_chunk(0, b"only chunk").unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read(chunk_file_name(&prefix, 0)).unwrap(), b"only chunk");
        for index in 1..4 {
            assert!(!chunk_file_name(&prefix, index).exists(), "chunk {index}");
        }
        // Unreachable by index order, so left alone.
        assert!(chunk_file_name(&prefix, 6).exists());
    }

    #[test]
    fn test_combined_marker_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.bc");

        let mut writer = ChunkWriter::combined(&path, Framing::Marker).unwrap();
        assert_eq!(writer.write_chunk(0, b"first").unwrap(), 12);
        writer.write_chunk(1, b"second").unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"first_cHuNK_second_cHuNK_");
    }

    #[test]
    fn test_combined_length_prefixed_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.bc");

        let mut writer = ChunkWriter::combined(&path, Framing::LengthPrefixed).unwrap();
        writer.write_chunk(0, b"abc").unwrap();
        writer.finish().unwrap();

        let mut expected = 3u64.to_le_bytes().to_vec();
        expected.extend_from_slice(b"abc");
        assert_eq!(fs::read(&path).unwrap(), expected);
    }

    #[test]
    fn test_combined_truncates_previous_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.bc");
        fs::write(&path, vec![0xAA; 4096]).unwrap();

        let writer = ChunkWriter::combined(&path, Framing::Marker).unwrap();
        writer.finish().unwrap();
        assert!(fs::read(&path).unwrap().is_empty());
    }
}
