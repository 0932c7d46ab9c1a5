//! Layered session configuration
//!
//! Values come from, in increasing precedence: built-in defaults, the TOML
//! file given by `--config`, `BIGCOMPRESSOR_*` environment variables and
//! command-line flags.

use anyhow::{Context, Result};
use bigcompressor::{Codec, CompressorConfig, Framing};
use clap::{Args, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Codec selection on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecArg {
    Lz4,
    Zlib,
}

impl From<CodecArg> for Codec {
    fn from(codec: CodecArg) -> Self {
        match codec {
            CodecArg::Lz4 => Self::Lz4,
            CodecArg::Zlib => Self::Zlib,
        }
    }
}

/// Framing selection on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramingArg {
    Marker,
    LengthPrefixed,
}

impl From<FramingArg> for Framing {
    fn from(framing: FramingArg) -> Self {
        match framing {
            FramingArg::Marker => Self::Marker,
            FramingArg::LengthPrefixed => Self::LengthPrefixed,
        }
    }
}

/// Session options shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "BIGCOMPRESSOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Uncompressed bytes per chunk (accepts K, M and G suffixes)
    #[arg(long, global = true, env = "BIGCOMPRESSOR_MAX_CHUNK_SIZE", value_parser = parse_size)]
    pub max_chunk_size: Option<u64>,

    /// Write one combined file instead of one file per chunk
    #[arg(long, global = true, env = "BIGCOMPRESSOR_COMBINE_CHUNKS")]
    pub combine_chunks: Option<bool>,

    /// Largest chunk accepted while decompressing (accepts K, M and G suffixes)
    #[arg(long, global = true, env = "BIGCOMPRESSOR_MAX_SCAN_BUFFER", value_parser = parse_size)]
    pub max_scan_buffer: Option<u64>,

    /// Chunk delimiting scheme of combined files
    #[arg(long, global = true, value_enum, env = "BIGCOMPRESSOR_FRAMING")]
    pub framing: Option<FramingArg>,

    /// Block compressor for new chunks
    #[arg(long, global = true, value_enum, env = "BIGCOMPRESSOR_CODEC")]
    pub codec: Option<CodecArg>,

    /// Size of the buffer used to copy file contents
    #[arg(long, global = true, env = "BIGCOMPRESSOR_COPY_BUFFER_SIZE", value_parser = parse_size)]
    pub copy_buffer_size: Option<u64>,
}

impl SettingsArgs {
    /// Build the session configuration from every layer
    pub fn resolve(&self) -> Result<CompressorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                debug!("Loaded configuration from {}", path.display());
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => CompressorConfig::default(),
        };

        if let Some(bytes) = self.max_chunk_size {
            config.max_chunk_size = bytes;
        }
        if let Some(combine) = self.combine_chunks {
            config.combine_chunks = combine;
        }
        if let Some(bytes) = self.max_scan_buffer {
            config.max_scan_buffer = to_usize(bytes, "max-scan-buffer")?;
        }
        if let Some(framing) = self.framing {
            config.framing = framing.into();
        }
        if let Some(codec) = self.codec {
            config.codec = codec.into();
        }
        if let Some(bytes) = self.copy_buffer_size {
            config.copy_buffer_size = to_usize(bytes, "copy-buffer-size")?;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn to_usize(bytes: u64, name: &str) -> Result<usize> {
    usize::try_from(bytes).with_context(|| format!("--{name} {bytes} does not fit in memory"))
}

/// Parse a byte count such as `4096`, `512K`, `64M` or `1G` (binary units)
pub fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);

    let number: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{value}'"))?;
    let shift = match suffix.to_ascii_uppercase().as_str() {
        "" | "B" => 0,
        "K" | "KB" | "KIB" => 10,
        "M" | "MB" | "MIB" => 20,
        "G" | "GB" | "GIB" => 30,
        other => return Err(format!("unknown size suffix '{other}'")),
    };
    number
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("size '{value}' is too large"))
}
