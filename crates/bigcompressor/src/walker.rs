//! Deterministic traversal of a source tree
//!
//! The walk is pre-order (a directory before its children) with siblings
//! sorted by file name. Symlinks are not followed, and anything that is
//! neither a regular file nor a directory is skipped.

use serde::Serialize;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// One filesystem object under the source root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Absolute (or caller-relative) path used to read the object
    pub source: PathBuf,
    /// Path relative to the source root, used as the archive name
    pub relative: PathBuf,
    /// Permission bits
    pub mode: u32,
    /// Whether the object is a directory
    pub is_dir: bool,
    /// Byte size; always 0 for directories
    pub size: u64,
}

impl Entry {
    fn from_metadata(source: PathBuf, relative: PathBuf, metadata: &Metadata) -> Self {
        let is_dir = metadata.is_dir();
        Self {
            source,
            relative,
            mode: permission_bits(metadata),
            is_dir,
            size: if is_dir { 0 } else { metadata.len() },
        }
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Lazy iterator over the entries below a source root
///
/// The root itself is not yielded and must be a directory. The first error
/// ends the walk.
pub struct Walk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    skipped: u64,
    checked: bool,
    failed: bool,
}

impl Walk {
    /// Number of symlinks and special files skipped so far
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Reject a root that exists but is not a directory
    ///
    /// A missing root is left to `walkdir`, which reports it as a walk error.
    fn check_root(&self) -> Result<()> {
        match fs::metadata(&self.root) {
            Ok(metadata) if !metadata.is_dir() => Err(Error::io(
                &self.root,
                io::Error::new(
                    io::ErrorKind::NotADirectory,
                    "source root is not a directory",
                ),
            )),
            _ => Ok(()),
        }
    }

    fn visit(&mut self, dent: &walkdir::DirEntry) -> Result<Option<Entry>> {
        let file_type = dent.file_type();
        if !file_type.is_file() && !file_type.is_dir() {
            warn!("Skipping non-regular entry {}", dent.path().display());
            self.skipped += 1;
            return Ok(None);
        }

        let metadata = dent.metadata().map_err(|source| Error::Walk {
            path: dent.path().to_path_buf(),
            source,
        })?;

        let relative = dent
            .path()
            .strip_prefix(&self.root)
            .map_err(|_| {
                Error::io(
                    dent.path(),
                    io::Error::other("walk produced a path outside of the root"),
                )
            })?
            .to_path_buf();

        let entry = Entry::from_metadata(dent.path().to_path_buf(), relative, &metadata);
        trace!(
            "Walked {} (dir={}, size={})",
            entry.relative.display(),
            entry.is_dir,
            entry.size
        );
        Ok(Some(entry))
    }
}

impl Iterator for Walk {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if !self.checked {
            self.checked = true;
            if let Err(e) = self.check_root() {
                self.failed = true;
                return Some(Err(e));
            }
        }

        loop {
            let dent = match self.inner.next()? {
                Ok(dent) => dent,
                Err(source) => {
                    self.failed = true;
                    let path = source
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    return Some(Err(Error::Walk { path, source }));
                }
            };

            match self.visit(&dent) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Walk every directory and regular file below `root`
pub fn walk(root: impl AsRef<Path>) -> Walk {
    let root = root.as_ref().to_path_buf();
    let inner = WalkDir::new(&root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    Walk {
        root,
        inner,
        skipped: 0,
        checked: false,
        failed: false,
    }
}
