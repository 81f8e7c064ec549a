//! Atomic writes and change-aware copies.

use std::io;
use std::time::SystemTime;

use quire_source::SourceTree;

use crate::error::{BuildError, StageError};
use crate::output::{parent, OutputFs};

/// Result of a change-aware copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    Unchanged,
}

/// Write `bytes` to `path` through a temporary file in the same directory.
///
/// The final path only ever holds a complete payload. On failure the
/// temporary file is removed before the error is returned.
pub fn write_atomic(
    out: &dyn OutputFs,
    path: &str,
    bytes: &[u8],
    modified: Option<SystemTime>,
) -> Result<(), StageError> {
    let temp = out
        .create_temp(parent(path))
        .map_err(|e| StageError::new(path, e))?;

    let result = (|| -> io::Result<()> {
        out.write_file(&temp, bytes)?;
        if let Some(modified) = modified {
            out.set_modified(&temp, modified)?;
        }
        out.rename(&temp, path)
    })();

    if let Err(source) = result {
        if let Err(e) = out.remove_file(&temp) {
            tracing::warn!("Failed to remove temporary file {}: {}", temp, e);
        }
        return Err(StageError::new(path, source));
    }

    Ok(())
}

/// Copy `path` from the source tree unless the output already matches.
///
/// Files match when both size and modification time agree. The copy takes
/// the source modification time so a repeated run finds it unchanged.
pub fn copy_if_changed(
    source: &SourceTree,
    out: &dyn OutputFs,
    path: &str,
) -> Result<CopyOutcome, BuildError> {
    let stat = source.stat(path)?;

    if let Ok(existing) = out.stamp(path) {
        if stat.modified.is_some() && existing.size == stat.size && existing.modified == stat.modified
        {
            tracing::debug!("Unchanged: {}", path);
            return Ok(CopyOutcome::Unchanged);
        }
    }

    let bytes = source.open(path)?;
    write_atomic(out, path, &bytes, stat.modified)?;
    tracing::debug!("Copied {}", path);

    Ok(CopyOutcome::Copied)
}
