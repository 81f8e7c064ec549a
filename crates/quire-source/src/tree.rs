//! The layered source tree.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bundled::BundledLayer;
use crate::layer::{DirLayer, Entry, Layer, Stat};
use crate::path::normalize;

/// Errors that can occur when resolving a source path.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source file not found: {path}")]
    NotFound { path: String },

    #[error("Invalid source path: {path}")]
    InvalidPath { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    /// Whether this error means the path exists in no layer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// An ordered list of layers, highest precedence first.
///
/// Every lookup walks the layers in order and returns the first hit. A
/// layer is only skipped when it reports the path as missing; any other
/// failure is returned to the caller.
#[derive(Debug, Clone)]
pub struct SourceTree {
    layers: Vec<Arc<dyn Layer>>,
}

impl SourceTree {
    /// Create a tree from explicit layers.
    pub fn new(layers: Vec<Arc<dyn Layer>>) -> Self {
        Self { layers }
    }

    /// The usual tree: an optional user directory above the bundled theme.
    pub fn with_user_dir(user_dir: Option<PathBuf>) -> Self {
        let mut layers: Vec<Arc<dyn Layer>> = Vec::new();
        if let Some(dir) = user_dir {
            layers.push(Arc::new(DirLayer::new(dir)));
        }
        layers.push(Arc::new(BundledLayer::new()));
        Self::new(layers)
    }

    /// Layers in precedence order.
    pub fn layers(&self) -> &[Arc<dyn Layer>] {
        &self.layers
    }

    /// Read a file from the first layer that has it.
    pub fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        self.first_hit(path, |layer, p| layer.open(p))
    }

    /// Read a file as UTF-8 text.
    pub fn read_to_string(&self, path: &str) -> Result<String, SourceError> {
        let bytes = self.open(path)?;
        String::from_utf8(bytes).map_err(|e| SourceError::Io {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }

    /// Stat a path in the first layer that has it.
    pub fn stat(&self, path: &str) -> Result<Stat, SourceError> {
        self.first_hit(path, |layer, p| layer.stat(p))
    }

    /// Whether any layer contains `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    /// List a directory.
    ///
    /// Listings of every layer containing `dir` are merged by name; a
    /// higher layer's entry shadows a lower one with the same name.
    pub fn list(&self, dir: &str) -> Result<Vec<Entry>, SourceError> {
        let dir = clean(dir)?;
        let mut merged: BTreeMap<String, Entry> = BTreeMap::new();
        let mut found = false;

        for layer in &self.layers {
            match layer.list(&dir) {
                Ok(entries) => {
                    found = true;
                    for entry in entries {
                        merged.entry(entry.name.clone()).or_insert(entry);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(SourceError::Io { path: dir, source }),
            }
        }

        if !found {
            return Err(SourceError::NotFound { path: dir });
        }

        Ok(merged.into_values().collect())
    }

    fn first_hit<T>(
        &self,
        path: &str,
        op: impl Fn(&dyn Layer, &str) -> io::Result<T>,
    ) -> Result<T, SourceError> {
        let path = clean(path)?;

        for layer in &self.layers {
            match op(layer.as_ref(), &path) {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(SourceError::Io { path, source }),
            }
        }

        Err(SourceError::NotFound { path })
    }
}

fn clean(path: &str) -> Result<String, SourceError> {
    normalize(path).ok_or_else(|| SourceError::InvalidPath {
        path: path.to_string(),
    })
}
