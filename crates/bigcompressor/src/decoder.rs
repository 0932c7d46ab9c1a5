//! Decompression and replay of a single chunk
//!
//! Only regular files are written. Directories come into existence as
//! parents of the files they contain; empty directories and every other
//! entry type are skipped.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::codec::{Codec, CodecReader};
use crate::error::{Error, Result};
use crate::scanner::read_retrying;

/// Totals for one replayed chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Regular files written
    pub files: u64,
    /// Content bytes written
    pub bytes: u64,
}

/// An entry recorded in a chunk archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedEntry {
    /// Path relative to the original source root
    pub path: PathBuf,
    /// Content size in bytes
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

fn open_archive(index: usize, data: &[u8]) -> Result<tar::Archive<CodecReader<&[u8]>>> {
    let codec = Codec::detect(data).ok_or_else(|| Error::UnknownCodec {
        chunk: index,
        magic: data.iter().take(4).copied().collect(),
    })?;
    trace!("Chunk {} uses {}", index, codec.name());
    Ok(tar::Archive::new(CodecReader::new(codec, data)))
}

/// Resolve an archive path below `root`, rejecting anything that escapes it
fn destination_path(root: &Path, name: &Path, chunk: usize) -> Result<PathBuf> {
    let mut target = root.to_path_buf();
    let mut depth = 0usize;
    for component in name.components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeEntryPath {
                    chunk,
                    path: name.to_path_buf(),
                });
            }
        }
    }

    if depth == 0 {
        return Err(Error::UnsafeEntryPath {
            chunk,
            path: name.to_path_buf(),
        });
    }
    Ok(target)
}

/// Copy exactly `len` bytes from `reader` to `file` through `buf`
fn copy_exact<R: Read>(
    reader: &mut R,
    file: &mut File,
    buf: &mut [u8],
    len: u64,
    chunk: usize,
    target: &Path,
) -> Result<()> {
    let mut remaining = len;
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = read_retrying(reader, &mut buf[..want])
            .map_err(|source| Error::Decode { chunk, source })?;
        if n == 0 {
            return Err(Error::Decode {
                chunk,
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} ended {remaining} bytes early", target.display()),
                ),
            });
        }
        file.write_all(&buf[..n]).map_err(|source| Error::Replay {
            chunk,
            path: target.to_path_buf(),
            source,
        })?;
        remaining -= n as u64;
    }
    Ok(())
}

fn create_file(target: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(target)
}

#[cfg(unix)]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    file.set_permissions(permissions)
}

/// Decompress `data` and write its regular files below `dest`
///
/// Files are closed as soon as they are written. Files already written
/// stay in place when a later entry fails.
pub fn replay_chunk(
    index: usize,
    data: &[u8],
    dest: &Path,
    copy_buf: &mut [u8],
) -> Result<ReplayStats> {
    let decode = |source| Error::Decode {
        chunk: index,
        source,
    };

    let mut archive = open_archive(index, data)?;
    let mut stats = ReplayStats::default();

    for entry in archive.entries().map_err(decode)? {
        let mut entry = entry.map_err(decode)?;
        let kind = entry.header().entry_type();
        let name = entry.path().map_err(decode)?.into_owned();

        if kind.is_dir() {
            trace!("Chunk {}: directory {}", index, name.display());
            continue;
        }
        if !kind.is_file() {
            warn!(
                "Chunk {}: skipping {} of type {:?}",
                index,
                name.display(),
                kind
            );
            continue;
        }

        let mode = entry.header().mode().map_err(decode)?;
        let size = entry.header().size().map_err(decode)?;
        let target = destination_path(dest, &name, index)?;

        if let Some(parent) = target.parent() {
            if !parent.is_dir() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreation {
                    chunk: index,
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let replay = |source| Error::Replay {
            chunk: index,
            path: target.clone(),
            source,
        };
        let mut file = create_file(&target, mode).map_err(replay)?;
        copy_exact(&mut entry, &mut file, copy_buf, size, index, &target)?;
        apply_mode(&file, mode).map_err(replay)?;
        drop(file);

        trace!("Chunk {}: restored {} ({} bytes)", index, name.display(), size);
        stats.files += 1;
        stats.bytes += size;
    }

    debug!(
        "Replayed chunk {}: {} files, {} bytes",
        index, stats.files, stats.bytes
    );
    Ok(stats)
}

/// Decompress `data` and list its archive entries without writing anything
pub fn list_chunk(index: usize, data: &[u8]) -> Result<Vec<ArchivedEntry>> {
    let decode = |source| Error::Decode {
        chunk: index,
        source,
    };

    let mut archive = open_archive(index, data)?;
    let mut entries = Vec::new();
    for entry in archive.entries().map_err(decode)? {
        let entry = entry.map_err(decode)?;
        let header = entry.header();
        entries.push(ArchivedEntry {
            path: entry.path().map_err(decode)?.into_owned(),
            size: header.size().map_err(decode)?,
            mode: header.mode().map_err(decode)?,
            is_dir: header.entry_type().is_dir(),
        });
    }
    Ok(entries)
}
