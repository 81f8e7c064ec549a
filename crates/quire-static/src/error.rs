//! Build error taxonomy.

use std::io;

use quire_content::ContentError;
use quire_source::SourceError;

/// A filesystem failure while staging output.
#[derive(Debug, thiserror::Error)]
#[error("Failed to stage {path}: {source}")]
pub struct StageError {
    pub path: String,
    #[source]
    pub source: io::Error,
}

impl StageError {
    pub fn new(path: impl Into<String>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a build pass.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to compile {file}: {message}")]
    Compile { file: String, message: String },

    #[error(transparent)]
    Stage(#[from] StageError),
}

impl BuildError {
    pub fn compile(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            file: file.into(),
            message: message.into(),
        }
    }
}

impl From<ContentError> for BuildError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Source(e) => Self::Source(e),
            other => Self::Parse(other.to_string()),
        }
    }
}
