//! Output filesystems a build writes into.
//!
//! Paths are logical and `/`-separated, relative to the output root. The
//! empty path names the root itself.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

/// Size and modification time of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// The primitive operations staging needs from a target filesystem.
pub trait OutputFs: Send + Sync + fmt::Debug {
    fn create_dir_all(&self, path: &str) -> io::Result<()>;

    /// Create a new, uniquely named empty file inside `dir` and return its path.
    fn create_temp(&self, dir: &str) -> io::Result<String>;

    /// Replace the contents of an existing file.
    fn write_file(&self, path: &str, bytes: &[u8]) -> io::Result<()>;

    fn set_modified(&self, path: &str, modified: SystemTime) -> io::Result<()>;

    /// Move `from` over `to`, replacing any file already there.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    fn stamp(&self, path: &str) -> io::Result<FileStamp>;
}

/// Parent directory of a logical path (`""` for top-level files).
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|pos| &path[..pos]).unwrap_or("")
}

/// An output directory on disk.
#[derive(Debug, Clone)]
pub struct DiskOutput {
    root: PathBuf,
}

impl DiskOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

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

impl OutputFs for DiskOutput {
    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path))
    }

    fn create_temp(&self, dir: &str) -> io::Result<String> {
        let file = tempfile::Builder::new()
            .prefix(".quire")
            .tempfile_in(self.resolve(dir))?;
        let kept = file.into_temp_path().keep().map_err(|e| e.error)?;
        published_permissions(&kept)?;

        let name = kept
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::other("temporary file name is not UTF-8"))?;

        Ok(if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        })
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.resolve(path), bytes)
    }

    fn set_modified(&self, path: &str, modified: SystemTime) -> io::Result<()> {
        fs::File::options()
            .write(true)
            .open(self.resolve(path))?
            .set_modified(modified)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn stamp(&self, path: &str) -> io::Result<FileStamp> {
        let meta = fs::metadata(self.resolve(path))?;
        Ok(FileStamp {
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Temp files start owner-only; published files are world-readable.
#[cfg(unix)]
fn published_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn published_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[derive(Debug, Clone)]
struct MemoryFile {
    bytes: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<String, MemoryFile>,
    dirs: BTreeSet<String>,
    next_temp: u64,
}

impl MemoryTree {
    fn require_dir(&self, dir: &str) -> io::Result<()> {
        if dir.is_empty() || self.dirs.contains(dir) {
            Ok(())
        } else {
            Err(not_found(dir))
        }
    }
}

/// A disposable in-memory output tree.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    tree: Mutex<MemoryTree>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, MemoryTree>> {
        self.tree
            .lock()
            .map_err(|_| io::Error::other("memory output lock poisoned"))
    }

    /// Freeze the tree into an immutable snapshot.
    pub fn into_snapshot(self) -> SiteSnapshot {
        let tree = match self.tree.into_inner() {
            Ok(tree) => tree,
            Err(poisoned) => poisoned.into_inner(),
        };
        SiteSnapshot {
            files: tree
                .files
                .into_iter()
                .map(|(path, file)| (path, file.bytes))
                .collect(),
        }
    }
}

impl OutputFs for MemoryOutput {
    fn create_dir_all(&self, path: &str) -> io::Result<()> {
        let mut tree = self.lock()?;
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            if tree.files.contains_key(&current) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{current} is a file"),
                ));
            }
            tree.dirs.insert(current.clone());
        }
        Ok(())
    }

    fn create_temp(&self, dir: &str) -> io::Result<String> {
        let mut tree = self.lock()?;
        tree.require_dir(dir)?;

        tree.next_temp += 1;
        let name = format!(".quire{}.tmp", tree.next_temp);
        let path = if dir.is_empty() {
            name
        } else {
            format!("{dir}/{name}")
        };
        tree.files.insert(
            path.clone(),
            MemoryFile {
                bytes: Vec::new(),
                modified: SystemTime::now(),
            },
        );
        Ok(path)
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let mut tree = self.lock()?;
        tree.require_dir(parent(path))?;
        tree.files.insert(
            path.to_string(),
            MemoryFile {
                bytes: bytes.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn set_modified(&self, path: &str, modified: SystemTime) -> io::Result<()> {
        let mut tree = self.lock()?;
        let file = tree.files.get_mut(path).ok_or_else(|| not_found(path))?;
        file.modified = modified;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut tree = self.lock()?;
        tree.require_dir(parent(to))?;
        let file = tree.files.remove(from).ok_or_else(|| not_found(from))?;
        tree.files.insert(to.to_string(), file);
        Ok(())
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        let mut tree = self.lock()?;
        tree.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn stamp(&self, path: &str) -> io::Result<FileStamp> {
        let tree = self.lock()?;
        let file = tree.files.get(path).ok_or_else(|| not_found(path))?;
        Ok(FileStamp {
            size: file.bytes.len() as u64,
            modified: Some(file.modified),
        })
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} not found"))
}

/// One complete, immutable build output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteSnapshot {
    files: BTreeMap<String, Vec<u8>>,
}

impl SiteSnapshot {
    /// Contents of the file at a logical path.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
