//! CLI command implementations.

pub mod build;
pub mod bundled;
pub mod init;
pub mod serve;

use std::path::PathBuf;

use quire_content::BuildParameters;
use quire_source::SourceTree;
use quire_static::{BuildConfig, StaticBuilder};

/// Builder over the bundled theme, overridden by `source` when given.
pub(crate) fn builder(source: Option<PathBuf>, params: BuildParameters) -> StaticBuilder {
    if let Some(dir) = &source {
        tracing::info!("Using sources from {}", dir.display());
    }

    StaticBuilder::new(BuildConfig {
        source: SourceTree::with_user_dir(source),
        params,
    })
}
