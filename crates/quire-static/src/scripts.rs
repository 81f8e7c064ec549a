//! Script bundling from leading `//= require` directives.

use std::collections::HashSet;
use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use quire_source::path::join_relative;
use quire_source::{SourceError, SourceTree};
use regex::Regex;

use crate::error::BuildError;
use crate::output::OutputFs;
use crate::stage::write_atomic;

pub const SCRIPTS_DIR: &str = "scripts";

/// Aggregate bundle shipped when search is enabled.
pub const SEARCH_BUNDLE: &str = "all.js";

/// Aggregate bundle shipped when search is disabled.
pub const NOSEARCH_BUNDLE: &str = "all_nosearch.js";

static REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//= require (.+)$").expect("valid require regex"));

/// One entry script flattened with its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    /// Entry file name inside `scripts/`
    pub entry: String,
    /// Source paths in output order, dependencies first
    pub files: Vec<String>,
    /// Concatenated bodies
    pub content: String,
}

#[derive(Default)]
struct BundleState {
    included: HashSet<String>,
    files: Vec<String>,
    content: String,
}

/// Resolves require directives against a source tree.
pub struct Bundler<'a> {
    source: &'a SourceTree,
}

impl<'a> Bundler<'a> {
    pub fn new(source: &'a SourceTree) -> Self {
        Self { source }
    }

    /// Entry scripts to bundle, leaving out the aggregate that does not apply.
    pub fn entries(&self, search: bool) -> Result<Vec<String>, BuildError> {
        let skipped = if search { NOSEARCH_BUNDLE } else { SEARCH_BUNDLE };

        Ok(self
            .source
            .list(SCRIPTS_DIR)?
            .into_iter()
            .filter(|e| !e.is_dir && e.name.ends_with(".js") && e.name != skipped)
            .map(|e| e.name)
            .collect())
    }

    /// Bundle `scripts/<entry>` with everything it requires.
    pub fn bundle(&self, entry: &str) -> Result<ScriptBundle, BuildError> {
        let mut state = BundleState::default();
        self.include(&format!("{SCRIPTS_DIR}/{entry}"), &mut state)?;

        Ok(ScriptBundle {
            entry: entry.to_string(),
            files: state.files,
            content: state.content,
        })
    }

    fn include(&self, path: &str, state: &mut BundleState) -> Result<(), BuildError> {
        if !state.included.insert(path.to_string()) {
            return Ok(());
        }

        let text = self.source.read_to_string(path)?;
        let mut body = String::with_capacity(text.len());
        let mut scanning = true;

        for line in text.lines() {
            if scanning {
                if let Some(caps) = REQUIRE.captures(line) {
                    let reference = caps[1].trim();
                    let dependency = join_relative(path, reference)
                        .map(|p| format!("{p}.js"))
                        .ok_or_else(|| SourceError::InvalidPath {
                            path: reference.to_string(),
                        })?;
                    self.include(&dependency, state)?;
                    continue;
                }
                scanning = false;
            }
            body.push_str(line);
            body.push('\n');
        }

        state.files.push(path.to_string());
        state.content.push_str(&body);
        Ok(())
    }
}

/// Minify a bundle; a syntax error fails with the bundle name.
pub fn minify_js(name: &str, source: &str) -> Result<String, BuildError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser gave up".to_string());
        return Err(BuildError::compile(name, message));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

/// Bundle every entry script and stage it under `scripts/`.
pub fn stage_scripts(
    source: &SourceTree,
    out: &dyn OutputFs,
    search: bool,
    minify: bool,
) -> Result<Vec<String>, BuildError> {
    let bundler = Bundler::new(source);
    let mut staged = Vec::new();

    for entry in bundler.entries(search)? {
        let bundle = bundler.bundle(&entry)?;
        let output = format!("{SCRIPTS_DIR}/{entry}");

        let content = if minify {
            minify_js(&output, &bundle.content)?
        } else {
            bundle.content
        };

        write_atomic(out, &output, content.as_bytes(), None)?;
        tracing::debug!("Bundled {} from {} files", output, bundle.files.len());
        staged.push(output);
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;
    use pretty_assertions::assert_eq;
    use quire_source::{DirLayer, Layer};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn scripts(files: &[(&str, &str)]) -> (tempfile::TempDir, SourceTree) {
        let dir = tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join("scripts").join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let layer: Arc<dyn Layer> = Arc::new(DirLayer::new(dir.path()));
        (dir, SourceTree::new(vec![layer]))
    }

    #[test]
    fn linear_chain_puts_dependencies_first() {
        let (_dir, source) = scripts(&[
            ("a.js", "//= require ./lib/b\nvar a = 1;\n"),
            ("lib/b.js", "//= require c\nvar b = 1;\n"),
            ("lib/c.js", "var c = 1;\n"),
        ]);

        let bundle = Bundler::new(&source).bundle("a.js").unwrap();

        assert_eq!(bundle.files, vec!["scripts/lib/c.js", "scripts/lib/b.js", "scripts/a.js"]);
        assert_eq!(bundle.content, "var c = 1;\nvar b = 1;\nvar a = 1;\n");
    }

    #[test]
    fn cycles_terminate_with_each_file_once() {
        let (_dir, source) = scripts(&[
            ("a.js", "//= require b\nvar a = 1;\n"),
            ("b.js", "//= require a\nvar b = 1;\n"),
        ]);

        let bundle = Bundler::new(&source).bundle("a.js").unwrap();

        assert_eq!(bundle.content, "var b = 1;\nvar a = 1;\n");
        assert_eq!(bundle.content.matches("var a").count(), 1);
    }

    #[test]
    fn diamond_includes_shared_file_once() {
        let (_dir, source) = scripts(&[
            ("a.js", "//= require b\n//= require c\nvar a;\n"),
            ("b.js", "//= require d\nvar b;\n"),
            ("c.js", "//= require d\nvar c;\n"),
            ("d.js", "var d;\n"),
        ]);

        let bundle = Bundler::new(&source).bundle("a.js").unwrap();

        assert_eq!(bundle.content, "var d;\nvar b;\nvar c;\nvar a;\n");
    }

    #[test]
    fn entries_bundle_shared_dependency_independently() {
        let (_dir, source) = scripts(&[
            ("one.js", "//= require shared/_d\nvar one;\n"),
            ("two.js", "//= require shared/_d\nvar two;\n"),
            ("shared/_d.js", "var d;\n"),
        ]);
        let bundler = Bundler::new(&source);

        let one = bundler.bundle("one.js").unwrap();
        let two = bundler.bundle("two.js").unwrap();

        assert!(one.content.contains("var d;"));
        assert!(two.content.contains("var d;"));
    }

    #[test]
    fn directives_after_first_other_line_are_body() {
        let (_dir, source) = scripts(&[
            ("a.js", "//= require b\n\n//= require c\nvar a;\n"),
            ("b.js", "var b;\n"),
            ("c.js", "var c;\n"),
        ]);

        let bundle = Bundler::new(&source).bundle("a.js").unwrap();

        assert_eq!(bundle.files, vec!["scripts/b.js", "scripts/a.js"]);
        assert_eq!(bundle.content, "var b;\n\n//= require c\nvar a;\n");
    }

    #[test]
    fn missing_dependency_is_a_source_error() {
        let (_dir, source) = scripts(&[("a.js", "//= require nowhere\n")]);

        let err = Bundler::new(&source).bundle("a.js").unwrap_err();

        assert!(matches!(err, BuildError::Source(ref e) if e.is_not_found()));
    }

    #[test]
    fn aggregate_entry_follows_search_flag() {
        let (_dir, source) = scripts(&[
            ("all.js", ""),
            ("all_nosearch.js", ""),
            ("extra.js", ""),
            ("lib/_x.js", ""),
        ]);
        let bundler = Bundler::new(&source);

        assert_eq!(bundler.entries(true).unwrap(), vec!["all.js", "extra.js"]);
        assert_eq!(bundler.entries(false).unwrap(), vec!["all_nosearch.js", "extra.js"]);
    }

    #[test]
    fn minifies_valid_script() {
        let source = "function greet(name) {\n  var message = 'hi ' + name;\n  return message;\n}\nwindow.greet = greet;\n";

        let minified = minify_js("scripts/a.js", source).unwrap();

        assert!(minified.len() < source.len());
        assert!(minified.contains("window.greet"));
    }

    #[test]
    fn malformed_script_fails_minification() {
        let err = minify_js("scripts/a.js", "function (\n").unwrap_err();

        assert!(matches!(err, BuildError::Compile { ref file, .. } if file == "scripts/a.js"));
    }

    #[test]
    fn stages_bundles_under_scripts() {
        let (_dir, source) = scripts(&[
            ("all_nosearch.js", "//= require lib/_x\nvar y = x;\n"),
            ("lib/_x.js", "var x = 1;\n"),
        ]);
        let out = MemoryOutput::new();
        out.create_dir_all("scripts").unwrap();

        let staged = stage_scripts(&source, &out, false, false).unwrap();

        assert_eq!(staged, vec!["scripts/all_nosearch.js"]);
        assert_eq!(
            out.into_snapshot().get("scripts/all_nosearch.js"),
            Some(&b"var x = 1;\nvar y = x;\n"[..])
        );
    }
}
