//! Source layers.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata for a path inside a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Size in bytes (zero for directories)
    pub size: u64,
    /// Last modification time, if the layer knows it
    pub modified: Option<SystemTime>,
    /// Whether the path names a directory
    pub is_dir: bool,
}

/// A directory entry returned by [`Layer::list`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    /// File or directory name (no path separators)
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// One root of a layered source tree.
///
/// Implementations report a missing path with [`io::ErrorKind::NotFound`] so
/// the tree can fall through to the next layer. Reads never mutate the layer.
pub trait Layer: Send + Sync + fmt::Debug {
    /// Human readable name used in logs.
    fn name(&self) -> String;

    /// Read the full contents of a file.
    fn open(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Stat a file or directory.
    fn stat(&self, path: &str) -> io::Result<Stat>;

    /// List the immediate children of a directory.
    fn list(&self, dir: &str) -> io::Result<Vec<Entry>>;
}

/// A layer backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirLayer {
    root: PathBuf,
}

impl DirLayer {
    /// Create a layer rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this layer.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

impl Layer for DirLayer {
    fn name(&self) -> String {
        self.root.display().to_string()
    }

    fn open(&self, path: &str) -> io::Result<Vec<u8>> {
        let full = self.resolve(path);
        if full.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", full.display()),
            ));
        }
        fs::read(full)
    }

    fn stat(&self, path: &str) -> io::Result<Stat> {
        let meta = fs::metadata(self.resolve(path))?;
        Ok(Stat {
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().ok(),
            is_dir: meta.is_dir(),
        })
    }

    fn list(&self, dir: &str) -> io::Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(dir))? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            entries.push(Entry {
                name,
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort();
        Ok(entries)
    }
}
