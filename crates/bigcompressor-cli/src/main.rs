//! Command-line front end for chunked directory compression

mod output;
mod settings;

use anyhow::{Context, Result};
use bigcompressor::BigCompressor;
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, emit};
use crate::settings::SettingsArgs;

#[derive(Parser)]
#[command(
    name = "bigcompressor",
    about = "Split a directory tree into size-bounded compressed chunks and restore it",
    version,
    long_about = "Compresses a directory tree into LZ4 (or zlib) compressed tar chunks whose \
                  uncompressed size stays below a threshold, written either as one file per \
                  chunk or as a single combined file, and restores trees from such output."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a directory tree
    Compress {
        /// Directory to compress
        src: PathBuf,
        /// Combined output file, or prefix of per-chunk files
        dst: PathBuf,
    },

    /// Restore a directory tree
    Decompress {
        /// Combined file, a single chunk file, or the prefix given with --split
        src: PathBuf,
        /// Directory to restore into
        dst: PathBuf,
        /// Read per-chunk files <SRC>_0, <SRC>_1, ... in order
        #[arg(long)]
        split: bool,
    },

    /// List the entries of every chunk without extracting
    List {
        /// Combined file or single chunk file
        src: PathBuf,
    },

    /// Show how a directory tree would be split into chunks
    Plan {
        /// Directory to inspect
        src: PathBuf,
    },
}

fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::from(level).as_str().to_ascii_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let config = cli.settings.resolve()?;
    let mut session = BigCompressor::new(config)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Compress { src, dst } => {
            let report = session
                .compress(&src, &dst)
                .with_context(|| format!("failed to compress {}", src.display()))?;
            emit(&report, cli.format, &mut stdout)?;
        }
        Commands::Decompress { src, dst, split } => {
            let report = if split {
                session.decompress_split(&src, &dst)
            } else {
                session.decompress(&src, &dst)
            }
            .with_context(|| format!("failed to decompress {}", src.display()))?;
            emit(&report, cli.format, &mut stdout)?;
        }
        Commands::List { src } => {
            let listing = session
                .list(&src)
                .with_context(|| format!("failed to list {}", src.display()))?;
            emit(listing.as_slice(), cli.format, &mut stdout)?;
        }
        Commands::Plan { src } => {
            let chunks = session
                .plan(&src)
                .with_context(|| format!("failed to plan {}", src.display()))?;
            emit(chunks.as_slice(), cli.format, &mut stdout)?;
        }
    }

    Ok(())
}
