//! Session configuration
//!
//! A [`CompressorConfig`] controls how a source tree is cut into chunks,
//! how chunks are laid out on disk and how large a single chunk may grow
//! while it is being located during decompression.
//!
//! # Example
//!
//! ```
//! use bigcompressor::{CompressorConfig, Framing};
//!
//! let config = CompressorConfig::default()
//!     .with_max_chunk_size(8 * 1024 * 1024)
//!     .with_combine_chunks(true)
//!     .with_framing(Framing::LengthPrefixed);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::scanner::{CHUNK_SEPARATOR, MIN_TOKEN_LEN};

/// Default pre-compression chunk threshold (64 MiB)
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Default decompression scan buffer limit (256 MiB)
pub const DEFAULT_MAX_SCAN_BUFFER: usize = 256 * 1024 * 1024;

/// Default size of the reusable copy buffer (64 KiB)
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 64 * 1024;

/// How consecutive chunks are delimited inside a combined output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Each chunk is followed by the literal separator `_cHuNK_`
    ///
    /// Compatible with existing archives. A chunk whose compressed bytes
    /// happen to contain the separator is split in the wrong place and
    /// fails to decode.
    #[default]
    Marker,
    /// Each chunk is preceded by its length as a little-endian `u64`
    LengthPrefixed,
}

/// Configuration for a [`BigCompressor`](crate::BigCompressor) session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// Uncompressed bytes per chunk before a new chunk is started
    pub max_chunk_size: u64,
    /// Write one combined file instead of one file per chunk
    pub combine_chunks: bool,
    /// Largest chunk the decompressor will buffer while searching for a boundary
    pub max_scan_buffer: usize,
    /// Chunk delimiting scheme for combined output
    pub framing: Framing,
    /// Block compressor applied to each chunk's archive stream
    pub codec: Codec,
    /// Size of the buffer reused for file copies
    pub copy_buffer_size: usize,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            combine_chunks: true,
            max_scan_buffer: DEFAULT_MAX_SCAN_BUFFER,
            framing: Framing::default(),
            codec: Codec::default(),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl CompressorConfig {
    /// Set the pre-compression chunk threshold
    #[must_use]
    pub const fn with_max_chunk_size(mut self, bytes: u64) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    /// Choose between combined and per-chunk output
    #[must_use]
    pub const fn with_combine_chunks(mut self, combine: bool) -> Self {
        self.combine_chunks = combine;
        self
    }

    /// Set the decompression scan buffer limit
    #[must_use]
    pub const fn with_max_scan_buffer(mut self, bytes: usize) -> Self {
        self.max_scan_buffer = bytes;
        self
    }

    /// Set the framing used for combined output
    #[must_use]
    pub const fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Set the block compressor
    #[must_use]
    pub const fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the copy buffer size
    #[must_use]
    pub const fn with_copy_buffer_size(mut self, bytes: usize) -> Self {
        self.copy_buffer_size = bytes;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - the chunk threshold is zero
    /// - the copy buffer is empty
    /// - the scan buffer cannot hold a separator and a minimal chunk
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.copy_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "copy_buffer_size must be greater than zero".to_string(),
            ));
        }

        let min_scan = CHUNK_SEPARATOR.len() + MIN_TOKEN_LEN;
        if self.max_scan_buffer < min_scan {
            return Err(Error::InvalidConfig(format!(
                "max_scan_buffer must be at least {min_scan} bytes, got {}",
                self.max_scan_buffer
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompressorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.combine_chunks);
        assert_eq!(config.framing, Framing::Marker);
        assert_eq!(config.codec, Codec::Lz4);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = CompressorConfig::default().with_max_chunk_size(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_chunk_size"));
    }

    #[test]
    fn test_tiny_scan_buffer_rejected() {
        let config = CompressorConfig::default().with_max_scan_buffer(4);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_copy_buffer_rejected() {
        let config = CompressorConfig::default().with_copy_buffer_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_serde_uses_defaults() {
        let config: CompressorConfig =
            serde::Deserialize::deserialize(serde::de::value::MapDeserializer::<
                _,
                serde::de::value::Error,
            >::new(
                [("max_chunk_size", 4096u64)].into_iter()
            ))
            .unwrap();
        assert_eq!(config.max_chunk_size, 4096);
        assert_eq!(config.max_scan_buffer, DEFAULT_MAX_SCAN_BUFFER);
    }
}
