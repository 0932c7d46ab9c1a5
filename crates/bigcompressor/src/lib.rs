//! Chunked directory compression.
//!
//! This crate splits a directory tree into chunks whose total uncompressed
//! file size stays below a threshold, packs every chunk as a tar stream
//! compressed with LZ4 (or zlib), and restores trees from such output.
//!
//! # Architecture
//!
//! Compression runs as a pipeline of small stages:
//! - `walker`: sorted pre-order traversal of the source tree
//! - `planner`: greedy grouping of entries into size-bounded chunks
//! - `encoder`: one chunk into a compressed tar stream held in memory
//! - `writer`: per-chunk files or one combined file
//!
//! Decompression reverses it:
//! - `scanner`: splits a combined input into chunk tokens
//! - `decoder`: sniffs the codec and replays entries onto disk
//!
//! `session` ties the stages together behind [`BigCompressor`].
//!
//! # Example
//!
//! ```no_run
//! use bigcompressor::{BigCompressor, CompressorConfig, Framing};
//!
//! let config = CompressorConfig::default()
//!     .with_max_chunk_size(32 * 1024 * 1024)
//!     .with_framing(Framing::LengthPrefixed);
//! let mut session = BigCompressor::new(config)?;
//!
//! session.compress("assets", "out/assets.bc")?;
//! let report = session.decompress("out/assets.bc", "restored")?;
//! println!("restored {} files", report.files);
//! # Ok::<(), bigcompressor::Error>(())
//! ```
//!
//! # Output formats
//!
//! - **Per-chunk**: `<dst>_0`, `<dst>_1`, ... each holding one compressed chunk
//! - **Combined, marker framing**: chunks followed by the literal `_cHuNK_`
//! - **Combined, length-prefixed framing**: an 8-byte little-endian length
//!   before every chunk

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod planner;
pub mod scanner;
pub mod session;
pub mod walker;
pub mod writer;

pub use codec::Codec;
pub use config::{CompressorConfig, Framing};
pub use decoder::{ArchivedEntry, ReplayStats, list_chunk, replay_chunk};
pub use encoder::encode_chunk;
pub use error::{Error, Result};
pub use planner::{Chunk, plan_chunks};
pub use scanner::{
    CHUNK_SEPARATOR, ChunkSource, LengthPrefixedReader, MIN_TOKEN_LEN, MarkerScanner,
};
pub use session::{BigCompressor, ChunkListing, CompressionReport, DecompressionReport};
pub use walker::{Entry, Walk, walk};
pub use writer::{ChunkWriter, chunk_file_name};
