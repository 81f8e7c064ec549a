//! Extract bundled theme files for editing.

use std::path::Path;

use anyhow::{Context, Result};
use quire_source::bundled;

/// Run the init command.
pub fn run(target: &Path, components: Vec<String>, yes: bool) -> Result<()> {
    let components = if components.is_empty() {
        vec!["all".to_string()]
    } else {
        components
    };

    let written = bundled::extract(target, &components, yes)
        .with_context(|| format!("Failed to extract into {}", target.display()))?;

    for path in &written {
        tracing::debug!("Created {}", path);
    }
    tracing::info!("Extracted {} files into {}", written.len(), target.display());
    if !yes {
        tracing::info!("Existing files were kept. Use --yes to overwrite.");
    }

    Ok(())
}
