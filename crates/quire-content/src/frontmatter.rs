//! Front matter extraction and parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::params::BuildParameters;

/// Parsed front matter of the entry document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    /// Page title
    pub title: String,

    /// Whether the search box is shown
    pub search: bool,

    /// Highlight theme name
    pub highlight_theme: Option<String>,

    /// Language tabs for the code switcher
    pub language_tabs: Vec<LanguageTab>,

    /// Raw HTML snippets listed under the table of contents
    pub toc_footers: Vec<String>,

    /// Include names, resolved to `includes/_<name>.md`
    pub includes: Vec<String>,

    /// Inline SCSS layered in before every compiled stylesheet
    pub style: Option<String>,

    /// Logo file name inside `images/`
    pub logo: Option<String>,

    /// Right-to-left rendering
    #[serde(rename(deserialize = "enable_rtl"))]
    pub rtl: bool,

    /// Raw snippet injected into `<head>`
    pub html_head: Option<String>,
}

impl FrontMatter {
    /// Apply caller overrides for logo, search and RTL.
    pub fn apply(&mut self, params: &BuildParameters) {
        if let Some(logo) = &params.logo {
            self.logo = Some(logo.clone());
        }
        self.search = params.search.resolve(self.search);
        self.rtl = params.rtl.resolve(self.rtl);
    }
}

/// One language switcher tab.
///
/// Written either as a bare name (`- shell`) or as a single-entry map
/// giving a display label (`- shell: cURL`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLanguageTab")]
pub struct LanguageTab {
    pub name: String,
    pub label: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLanguageTab {
    Name(String),
    Labeled(BTreeMap<String, String>),
}

impl TryFrom<RawLanguageTab> for LanguageTab {
    type Error = String;

    fn try_from(raw: RawLanguageTab) -> Result<Self, Self::Error> {
        match raw {
            RawLanguageTab::Name(name) => Ok(Self {
                label: name.clone(),
                name,
            }),
            RawLanguageTab::Labeled(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "language tab must have exactly one name, found {}",
                        map.len()
                    ));
                }
                let (name, label) = map.into_iter().next().ok_or("empty language tab")?;
                Ok(Self { name, label })
            }
        }
    }
}

/// Where the line scanner currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeBlock,
    InsideBlock,
    Body,
}

/// Split a source file into its front matter and body.
///
/// The block must open on the very first line with `---`; a file whose
/// first line is anything else has no front matter and is all body.
pub fn split_front_matter(source: &str) -> Result<(FrontMatter, String), FrontMatterError> {
    let mut state = ScanState::BeforeBlock;
    let mut yaml = String::new();
    let mut body = String::new();

    for line in source.lines() {
        match state {
            ScanState::BeforeBlock if line == "---" => {
                state = ScanState::InsideBlock;
                continue;
            }
            ScanState::BeforeBlock => state = ScanState::Body,
            ScanState::InsideBlock if line == "---" => {
                state = ScanState::Body;
                continue;
            }
            ScanState::InsideBlock => {
                yaml.push_str(line);
                yaml.push('\n');
                continue;
            }
            ScanState::Body => {}
        }
        body.push_str(line);
        body.push('\n');
    }

    if state == ScanState::InsideBlock {
        return Err(FrontMatterError::Unclosed);
    }

    if yaml.trim().is_empty() {
        return Ok((FrontMatter::default(), body));
    }

    let front_matter =
        serde_yaml::from_str(&yaml).map_err(|e| FrontMatterError::InvalidYaml(e.to_string()))?;

    Ok((front_matter, body))
}

/// Errors that can occur when parsing front matter.
#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("Unclosed front matter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in front matter: {0}")]
    InvalidYaml(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Toggle;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_valid_front_matter() {
        let source = r#"---
title: API Reference
search: true
language_tabs:
  - shell
  - ruby: Ruby Client
includes:
  - errors
enable_rtl: true
---
# Introduction
"#;

        let (fm, body) = split_front_matter(source).unwrap();

        assert_eq!(fm.title, "API Reference");
        assert!(fm.search);
        assert!(fm.rtl);
        assert_eq!(fm.includes, vec!["errors".to_string()]);
        assert_eq!(
            fm.language_tabs,
            vec![
                LanguageTab { name: "shell".into(), label: "shell".into() },
                LanguageTab { name: "ruby".into(), label: "Ruby Client".into() },
            ]
        );
        assert_eq!(body, "# Introduction\n");
    }

    #[test]
    fn handles_no_front_matter() {
        let source = "# Just Markdown\n\nNo front matter here.\n";

        let (fm, body) = split_front_matter(source).unwrap();

        assert_eq!(fm, FrontMatter::default());
        assert_eq!(body, source);
    }

    #[test]
    fn delimiter_must_be_first_line() {
        let source = "\n---\ntitle: Late\n---\n";

        let (fm, body) = split_front_matter(source).unwrap();

        assert_eq!(fm.title, "");
        assert_eq!(body, source);
    }

    #[test]
    fn empty_block_yields_defaults() {
        let (fm, body) = split_front_matter("---\n---\nbody\n").unwrap();

        assert_eq!(fm, FrontMatter::default());
        assert_eq!(body, "body\n");
    }

    #[test]
    fn errors_on_unclosed_front_matter() {
        let result = split_front_matter("---\ntitle: Test\n# No closing\n");

        assert!(matches!(result, Err(FrontMatterError::Unclosed)));
    }

    #[test]
    fn errors_on_invalid_yaml() {
        let result = split_front_matter("---\ntitle: [invalid yaml\n---\n");

        assert!(matches!(result, Err(FrontMatterError::InvalidYaml(_))));
    }

    #[test]
    fn overrides_follow_tri_state_rules() {
        let mut fm = FrontMatter {
            search: true,
            rtl: false,
            logo: Some("logo.png".into()),
            ..Default::default()
        };

        fm.apply(&BuildParameters {
            search: Toggle::Unset,
            rtl: Toggle::Enabled,
            logo: Some("brand.png".into()),
            ..Default::default()
        });

        assert!(fm.search);
        assert!(fm.rtl);
        assert_eq!(fm.logo.as_deref(), Some("brand.png"));

        fm.apply(&BuildParameters {
            search: Toggle::Disabled,
            ..Default::default()
        });

        assert!(!fm.search);
        assert!(fm.rtl);
        assert_eq!(fm.logo.as_deref(), Some("brand.png"));
    }
}
