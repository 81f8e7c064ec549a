//! Build orchestration.

use std::time::Instant;

use quire_content::{load_document, BuildParameters};
use quire_source::SourceTree;

use crate::error::{BuildError, StageError};
use crate::output::OutputFs;
use crate::scripts::{stage_scripts, SCRIPTS_DIR};
use crate::stage::{copy_if_changed, write_atomic, CopyOutcome};
use crate::styles::{collect_overrides, stage_fonts, stage_stylesheets, FONTS_DIR, STYLESHEETS_DIR};

pub const IMAGES_DIR: &str = "images";

/// Output path of the rendered entry page.
pub const INDEX_FILE: &str = "index.html";

/// Image skipped when another logo was selected.
const DEFAULT_LOGO: &str = "logo.png";

/// Configuration for building a site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Layered source tree
    pub source: SourceTree,

    /// Caller overrides
    pub params: BuildParameters,
}

/// Result of a build operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    /// Staged script bundles
    pub scripts: Vec<String>,

    /// Staged stylesheets
    pub stylesheets: Vec<String>,

    /// Fonts referenced by stylesheets
    pub fonts: Vec<String>,

    /// Images present in the output
    pub images: Vec<String>,

    /// Assets copied this pass
    pub copied: usize,

    /// Assets skipped because the output already matched
    pub unchanged: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

impl BuildResult {
    fn record(&mut self, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Static site builder.
#[derive(Debug, Clone)]
pub struct StaticBuilder {
    config: BuildConfig,
}

impl StaticBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run one full pass into `out`.
    ///
    /// The first failing step aborts the pass. Files staged by earlier
    /// steps are left in place.
    pub fn build(&self, out: &dyn OutputFs) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let source = &self.config.source;
        let params = &self.config.params;
        let mut result = BuildResult::default();

        for dir in [SCRIPTS_DIR, STYLESHEETS_DIR, FONTS_DIR, IMAGES_DIR] {
            out.create_dir_all(dir).map_err(|e| StageError::new(dir, e))?;
        }

        let (doc, page) = load_document(source, params)?;
        let front_matter = &doc.front_matter;
        write_atomic(out, INDEX_FILE, &page.to_bytes(params.minify.html), None)?;
        tracing::debug!("Rendered {}", INDEX_FILE);

        result.scripts = stage_scripts(source, out, front_matter.search, params.minify.js)?;

        let overrides =
            collect_overrides(front_matter.style.as_deref(), params.style_file.as_deref())?;
        let (stylesheets, fonts) =
            stage_stylesheets(source, out, overrides, front_matter.rtl, params.minify.css)?;
        result.stylesheets = stylesheets;
        for (font, outcome) in stage_fonts(source, out, &fonts)? {
            result.record(outcome);
            result.fonts.push(font);
        }

        for (image, outcome) in stage_images(source, out, front_matter.logo.as_deref())? {
            result.record(outcome);
            result.images.push(image);
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Built {} scripts, {} stylesheets, {} assets copied ({} unchanged) in {}ms",
            result.scripts.len(),
            result.stylesheets.len(),
            result.copied,
            result.unchanged,
            result.duration_ms
        );

        Ok(result)
    }
}

/// Copy `images/`, leaving out the default logo when another was chosen.
fn stage_images(
    source: &SourceTree,
    out: &dyn OutputFs,
    logo: Option<&str>,
) -> Result<Vec<(String, CopyOutcome)>, BuildError> {
    let entries = match source.list(IMAGES_DIR) {
        Ok(entries) => entries,
        Err(e) if e.is_not_found() => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let skip_default = logo.is_some_and(|l| l != DEFAULT_LOGO);
    let mut staged = Vec::new();

    for entry in entries {
        if entry.is_dir || (skip_default && entry.name == DEFAULT_LOGO) {
            continue;
        }
        let path = format!("{IMAGES_DIR}/{}", entry.name);
        let outcome = copy_if_changed(source, out, &path)?;
        staged.push((path, outcome));
    }

    Ok(staged)
}
