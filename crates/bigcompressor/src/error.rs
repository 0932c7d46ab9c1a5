//! Error types for chunked compression and decompression.
//!
//! Every variant carries enough context (path, chunk index or input offset)
//! to identify the unit that failed. Nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for all `bigcompressor` operations
#[derive(Debug, Error)]
pub enum Error {
    /// Traversing the source tree failed
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// Path that could not be visited
        path: PathBuf,
        /// Underlying walk error
        #[source]
        source: walkdir::Error,
    },

    /// Filesystem operation failed outside of a chunk
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing an entry into the chunk archive failed
    #[error("failed to archive {path} in chunk {chunk}: {source}")]
    Archive {
        /// Chunk being encoded
        chunk: usize,
        /// Source path of the entry
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Finalizing the block compressor failed
    #[error("failed to finish compression of chunk {chunk}: {message}")]
    Compression {
        /// Chunk being encoded
        chunk: usize,
        /// Compressor error description
        message: String,
    },

    /// Reading the archive stream of a chunk failed
    #[error("failed to decode chunk {chunk}: {source}")]
    Decode {
        /// Chunk being decoded
        chunk: usize,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing a replayed file failed
    #[error("failed to restore {path} from chunk {chunk}: {source}")]
    Replay {
        /// Chunk being decoded
        chunk: usize,
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Creating a destination directory failed during replay
    ///
    /// The whole decompression stops; see [`Error::is_unrecoverable`].
    #[error("cannot create directory {path} for chunk {chunk}: {source}")]
    DirectoryCreation {
        /// Chunk being decoded
        chunk: usize,
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No chunk boundary was found within the configured scan buffer
    #[error(
        "no chunk boundary within {limit} bytes at input offset {offset}; the separator is missing or max_scan_buffer is too small"
    )]
    ScanBufferOverflow {
        /// Input offset where the unterminated chunk starts
        offset: u64,
        /// Configured scan buffer limit
        limit: usize,
    },

    /// A length-prefixed frame ended early
    #[error("truncated frame at input offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Input offset of the frame
        offset: u64,
        /// Bytes announced
        expected: u64,
        /// Bytes available
        actual: u64,
    },

    /// An archive entry would be written outside the destination
    #[error("refusing unsafe entry path {path} in chunk {chunk}")]
    UnsafeEntryPath {
        /// Chunk being decoded
        chunk: usize,
        /// Path recorded in the archive
        path: PathBuf,
    },

    /// The leading bytes of a chunk match no known codec
    #[error("unknown compression codec in chunk {chunk}: leading bytes {magic:02X?}")]
    UnknownCodec {
        /// Chunk being decoded
        chunk: usize,
        /// Up to four leading bytes of the chunk
        magic: Vec<u8>,
    },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the error must stop the whole operation rather than a single chunk
    pub const fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::DirectoryCreation { .. })
    }

    /// Index of the chunk that failed, when the failure is tied to one
    pub const fn chunk(&self) -> Option<usize> {
        match self {
            Self::Archive { chunk, .. }
            | Self::Compression { chunk, .. }
            | Self::Decode { chunk, .. }
            | Self::Replay { chunk, .. }
            | Self::DirectoryCreation { chunk, .. }
            | Self::UnsafeEntryPath { chunk, .. }
            | Self::UnknownCodec { chunk, .. } => Some(*chunk),
            Self::Walk { .. }
            | Self::Io { .. }
            | Self::ScanBufferOverflow { .. }
            | Self::TruncatedFrame { .. }
            | Self::InvalidConfig(_) => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for `bigcompressor` operations
pub type Result<T> = std::result::Result<T, Error>;
