//! Rendering of command results as text or JSON

use anyhow::Result;
use bigcompressor::{Chunk, ChunkListing, CompressionReport, DecompressionReport};
use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;

/// Output format for command results
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// A command result that can be printed in either format
pub trait Render: Serialize {
    fn render_text(&self, out: &mut dyn Write) -> std::io::Result<()>;
}

/// Print `value` to `out` in `format`
pub fn emit<T: Render + ?Sized>(value: &T, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Text => value.render_text(out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn kind(is_dir: bool) -> &'static str {
    if is_dir { "dir " } else { "file" }
}

impl Render for CompressionReport {
    fn render_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "Compressed {} files and {} directories into {} chunks",
            self.files, self.directories, self.chunks
        )?;
        writeln!(out, "  bytes in:  {}", self.bytes_in)?;
        writeln!(out, "  bytes out: {}", self.bytes_out)?;
        if self.skipped > 0 {
            writeln!(out, "  skipped:   {} special entries", self.skipped)?;
        }
        Ok(())
    }
}

impl Render for DecompressionReport {
    fn render_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "Restored {} files ({} bytes) from {} chunks",
            self.files, self.bytes, self.chunks
        )?;
        if self.discarded > 0 {
            writeln!(out, "  discarded: {} short tokens", self.discarded)?;
        }
        Ok(())
    }
}

impl Render for [ChunkListing] {
    fn render_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for chunk in self {
            writeln!(
                out,
                "chunk {} at offset {} ({} bytes compressed)",
                chunk.index, chunk.offset, chunk.compressed_size
            )?;
            for entry in &chunk.entries {
                writeln!(
                    out,
                    "  {} {:o} {:>12} {}",
                    kind(entry.is_dir),
                    entry.mode,
                    entry.size,
                    entry.path.display()
                )?;
            }
        }
        Ok(())
    }
}

impl Render for [Chunk] {
    fn render_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for chunk in self {
            writeln!(
                out,
                "chunk {}: {} entries, {} bytes",
                chunk.index,
                chunk.entries.len(),
                chunk.total_size
            )?;
            for entry in &chunk.entries {
                writeln!(
                    out,
                    "  {} {:>12} {}",
                    kind(entry.is_dir),
                    entry.size,
                    entry.relative.display()
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_report() {
        let report = DecompressionReport {
            chunks: 2,
            files: 3,
            bytes: 40,
            discarded: 0,
        };
        let mut out = Vec::new();
        emit(&report, OutputFormat::Json, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["chunks"], 2);
        assert_eq!(value["files"], 3);
    }

    #[test]
    fn test_text_report_hides_zero_skipped() {
        let report = CompressionReport {
            chunks: 1,
            files: 1,
            ..CompressionReport::default()
        };
        let mut out = Vec::new();
        emit(&report, OutputFormat::Text, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Compressed 1 files"));
        assert!(!text.contains("skipped"));
    }
}
