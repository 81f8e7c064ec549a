//! Caller-supplied build parameters.

use std::path::PathBuf;

/// A three-valued override flag.
///
/// `Unset` defers to whatever the page front matter says; `Enabled` and
/// `Disabled` win regardless of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Toggle {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl Toggle {
    /// Resolve against the value found in front matter.
    pub fn resolve(self, front_matter: bool) -> bool {
        match self {
            Self::Unset => front_matter,
            Self::Enabled => true,
            Self::Disabled => false,
        }
    }

    /// Build from a pair of mutually exclusive `--flag` / `--no-flag` switches.
    pub fn from_flags(on: bool, off: bool) -> Option<Self> {
        match (on, off) {
            (true, true) => None,
            (true, false) => Some(Self::Enabled),
            (false, true) => Some(Self::Disabled),
            (false, false) => Some(Self::Unset),
        }
    }
}

impl From<Option<bool>> for Toggle {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Self::Unset,
            Some(true) => Self::Enabled,
            Some(false) => Self::Disabled,
        }
    }
}

/// Independent minification switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Minify {
    pub html: bool,
    pub css: bool,
    pub js: bool,
}

impl Minify {
    /// All minification off.
    pub const NONE: Self = Self {
        html: false,
        css: false,
        js: false,
    };
}

impl Default for Minify {
    fn default() -> Self {
        Self {
            html: true,
            css: true,
            js: true,
        }
    }
}

/// Explicit overrides applied on top of the page front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildParameters {
    /// Search box override
    pub search: Toggle,

    /// Right-to-left stylesheet override
    pub rtl: Toggle,

    /// Logo file name inside `images/`
    pub logo: Option<String>,

    /// SCSS file layered in before every compiled stylesheet
    pub style_file: Option<PathBuf>,

    /// Output minification
    pub minify: Minify,
}
