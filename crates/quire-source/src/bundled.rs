//! The default theme compiled into the binary.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use rust_embed::RustEmbed;

use crate::layer::{Entry, Layer, Stat};

#[derive(RustEmbed)]
#[folder = "bundled/"]
struct Bundled;

/// Top-level directories that can be extracted as a group.
pub const COMPONENTS: &[&str] = &["fonts", "images", "layouts", "scripts", "stylesheets"];

/// Files making up the sample content.
const CONTENT_FILES: &[&str] = &["index.html.md", "includes/_errors.md"];

/// A read-only layer over the bundled default theme.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledLayer;

impl BundledLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for BundledLayer {
    fn name(&self) -> String {
        "<bundled>".to_string()
    }

    fn open(&self, path: &str) -> io::Result<Vec<u8>> {
        Bundled::get(path)
            .map(|file| file.data.into_owned())
            .ok_or_else(|| not_found(path))
    }

    fn stat(&self, path: &str) -> io::Result<Stat> {
        if let Some(file) = Bundled::get(path) {
            return Ok(Stat {
                size: file.data.len() as u64,
                modified: file
                    .metadata
                    .last_modified()
                    .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
                is_dir: false,
            });
        }

        if is_dir(path) {
            return Ok(Stat {
                size: 0,
                modified: None,
                is_dir: true,
            });
        }

        Err(not_found(path))
    }

    fn list(&self, dir: &str) -> io::Result<Vec<Entry>> {
        if !is_dir(dir) {
            return Err(not_found(dir));
        }

        let prefix = dir_prefix(dir);
        let mut entries = BTreeSet::new();

        for path in Bundled::iter() {
            let Some(rest) = path.strip_prefix(prefix.as_str()) else {
                continue;
            };
            match rest.split_once('/') {
                Some((name, _)) => entries.insert(Entry {
                    name: name.to_string(),
                    is_dir: true,
                }),
                None => entries.insert(Entry {
                    name: rest.to_string(),
                    is_dir: false,
                }),
            };
        }

        Ok(entries.into_iter().collect())
    }
}

/// All bundled file paths, sorted.
pub fn files() -> Vec<String> {
    let mut files: Vec<String> = Bundled::iter().map(|p| p.into_owned()).collect();
    files.sort();
    files
}

/// Errors that can occur while extracting bundled files.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unknown bundled component or file: {0}")]
    UnknownComponent(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Copy bundled files into `target` so they can be edited as overrides.
///
/// `components` accepts `all`, `contents`, one of [`COMPONENTS`], or the
/// path of a single bundled file. Existing files are kept unless
/// `overwrite` is set. Returns the paths written.
pub fn extract(
    target: &Path,
    components: &[String],
    overwrite: bool,
) -> Result<Vec<String>, ExtractError> {
    let all = files();
    let mut selected = BTreeSet::new();

    for component in components {
        match component.as_str() {
            "all" => selected.extend(all.iter().cloned()),
            "contents" => selected.extend(CONTENT_FILES.iter().map(|f| f.to_string())),
            c if COMPONENTS.contains(&c) => {
                let prefix = format!("{c}/");
                selected.extend(all.iter().filter(|f| f.starts_with(&prefix)).cloned());
            }
            c if all.iter().any(|f| f == c) => {
                selected.insert(c.to_string());
            }
            c => return Err(ExtractError::UnknownComponent(c.to_string())),
        }
    }

    let mut written = Vec::new();
    for path in selected {
        let dest = target.join(&path);
        if dest.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", dest.display());
            continue;
        }

        let Some(file) = Bundled::get(&path) else {
            continue;
        };
        let io_err = |source| ExtractError::Io {
            path: dest.display().to_string(),
            source,
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&dest, file.data.as_ref()).map_err(io_err)?;
        written.push(path);
    }

    Ok(written)
}

fn is_dir(dir: &str) -> bool {
    if dir.is_empty() {
        return true;
    }
    let prefix = dir_prefix(dir);
    Bundled::iter().any(|p| p.starts_with(prefix.as_str()))
}

fn dir_prefix(dir: &str) -> String {
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir.trim_end_matches('/'))
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{path} is not part of the bundled theme"),
    )
}
