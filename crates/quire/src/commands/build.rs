//! One-shot site build command.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use quire_static::DiskOutput;

use crate::config::{self, BuildArgs, ConfigFile};

/// Run the build command.
pub fn run(
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    args: &BuildArgs,
    file: &ConfigFile,
) -> Result<()> {
    tracing::info!("Building static site...");

    let params = config::build_parameters(args, &file.build)?;
    let source = config::source_dir(source, &file.build);
    let output = config::output_dir(output, &file.build);

    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let result = super::builder(source, params)
        .build(&DiskOutput::new(&output))
        .context("Build failed")?;

    tracing::info!(
        "Built {} scripts, {} stylesheets, {} fonts and {} images in {}ms",
        result.scripts.len(),
        result.stylesheets.len(),
        result.fonts.len(),
        result.images.len(),
        result.duration_ms
    );
    tracing::info!("Output: {}", output.display());

    Ok(())
}
