//! Static output for quire documentation sites.
//!
//! Every producer writes through an [`OutputFs`] using the atomic staging
//! primitive, so a file in the output is either absent or complete. The
//! [`StaticBuilder`] sequences page rendering, script bundling, stylesheet
//! compilation and asset copying into one pass.

pub mod builder;
pub mod error;
pub mod output;
pub mod scripts;
pub mod stage;
pub mod styles;

pub use builder::{BuildConfig, BuildResult, StaticBuilder, IMAGES_DIR, INDEX_FILE};
pub use error::{BuildError, StageError};
pub use output::{DiskOutput, FileStamp, MemoryOutput, OutputFs, SiteSnapshot};
pub use scripts::{Bundler, ScriptBundle};
pub use stage::{copy_if_changed, write_atomic, CopyOutcome};
pub use styles::{FontSet, ImportRegistry, StyleCompiler};
