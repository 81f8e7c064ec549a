//! SCSS compilation through `grass`, minified with `lightningcss`.
//!
//! Partials are served to the compiler from an in-memory registry instead of
//! the disk, so every layer of the source tree can contribute them.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use grass::{Fs, Options, OutputStyle};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use quire_source::{normalize, SourceError, SourceTree};
use regex::Regex;

use crate::error::{BuildError, StageError};
use crate::output::OutputFs;
use crate::stage::{copy_if_changed, write_atomic, CopyOutcome};

pub const STYLESHEETS_DIR: &str = "stylesheets";
pub const FONTS_DIR: &str = "fonts";

/// Suffix of stylesheets compiled to their own output file.
const TARGET_SUFFIX: &str = ".css.scss";

/// Partial left out (as an empty import) when RTL is off.
const RTL_PARTIAL: &str = "rtl";

static FONT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"font-url\(([^)]*)\)").expect("valid font-url regex"));

/// Partial sources by import name.
#[derive(Debug, Default, Clone)]
pub struct ImportRegistry {
    partials: HashMap<String, String>,
}

impl ImportRegistry {
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.partials.insert(name.into(), source.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.partials.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Import name a compiler path refers to, if it names a partial.
    fn lookup(&self, path: &Path) -> Option<&str> {
        let file = path.file_name()?.to_str()?;
        let name = file.strip_prefix('_')?.strip_suffix(".scss")?;
        self.get(name)
    }
}

impl Fs for ImportRegistry {
    fn is_dir(&self, _path: &Path) -> bool {
        false
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lookup(path)
            .map(|source| source.as_bytes().to_vec())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no partial for {}", path.display()),
                )
            })
    }
}

/// Font paths referenced by compiled stylesheets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FontSet {
    paths: BTreeSet<String>,
}

impl FontSet {
    pub fn insert(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Scan `stylesheets/` into a registry and the list of compile targets.
pub fn scan_stylesheets(
    source: &SourceTree,
    rtl: bool,
) -> Result<(ImportRegistry, Vec<String>), BuildError> {
    let mut registry = ImportRegistry::default();
    let mut targets = Vec::new();

    for entry in source.list(STYLESHEETS_DIR)? {
        if entry.is_dir {
            continue;
        }

        if let Some(name) = entry
            .name
            .strip_prefix('_')
            .and_then(|n| n.strip_suffix(".scss"))
        {
            if name == RTL_PARTIAL && !rtl {
                continue;
            }
            let text = source.read_to_string(&format!("{STYLESHEETS_DIR}/{}", entry.name))?;
            registry.insert(name, text);
        } else if entry.name.ends_with(TARGET_SUFFIX) {
            targets.push(entry.name);
        }
    }

    if !rtl {
        registry.insert(RTL_PARTIAL, "");
    }

    Ok((registry, targets))
}

/// Override text from front matter and an optional override file.
pub fn collect_overrides(
    front_matter: Option<&str>,
    style_file: Option<&Path>,
) -> Result<String, BuildError> {
    let mut overrides = String::new();

    if let Some(style) = front_matter {
        overrides.push_str(style);
        overrides.push('\n');
    }

    if let Some(path) = style_file {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        overrides.push_str(&text);
        overrides.push('\n');
    }

    Ok(overrides)
}

/// Compiles target stylesheets with a shared registry and overrides.
#[derive(Debug)]
pub struct StyleCompiler {
    registry: ImportRegistry,
    overrides: String,
    minify: bool,
}

impl StyleCompiler {
    pub fn new(registry: ImportRegistry, overrides: String, minify: bool) -> Self {
        Self {
            registry,
            overrides,
            minify,
        }
    }

    /// Compile one target, recording referenced fonts into `fonts`.
    pub fn compile(&self, file: &str, source: &str, fonts: &mut FontSet) -> Result<String, BuildError> {
        let options = Options::default()
            .fs(&self.registry)
            .style(OutputStyle::Expanded);

        let input = format!("{}{}", self.overrides, source);
        let css = grass::from_string(input, &options)
            .map_err(|e| BuildError::compile(file, e.to_string()))?;

        let css = rewrite_font_urls(file, &css, fonts)?;
        if self.minify {
            minify_css(file, &css)
        } else {
            Ok(css)
        }
    }
}

/// Minify compiled CSS.
pub fn minify_css(file: &str, css: &str) -> Result<String, BuildError> {
    let stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| BuildError::compile(file, format!("CSS parse error: {e}")))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| BuildError::compile(file, format!("CSS print error: {e}")))?;

    Ok(minified.code)
}

/// Replace `font-url(...)` calls with URLs into `fonts/`.
fn rewrite_font_urls(file: &str, css: &str, fonts: &mut FontSet) -> Result<String, BuildError> {
    let mut out = String::with_capacity(css.len());
    let mut last = 0;

    let mut at = 0;

    let skipped = comment_and_string_spans(css);

    while let Some(caps) = FONT_URL.captures_at(css, at) {
        let (Some(call), Some(arg)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        if let Some(span) = skipped.iter().find(|span| span.contains(&call.start())) {
            at = span.end;
            continue;
        }
        at = call.end();

        let url = parse_font_arg(arg.as_str())
            .map_err(|message| BuildError::compile(file, format!("{}: {}", call.as_str(), message)))?;

        out.push_str(&css[last..call.start()]);
        let _ = write!(out, "url(\"../{FONTS_DIR}/{url}\")");
        last = call.end();

        let path = url.split(['?', '#']).next().unwrap_or_default();
        fonts.insert(path);
    }

    out.push_str(&css[last..]);
    Ok(out)
}

/// Byte ranges of `/* */` comments and quoted strings in compiled CSS.
fn comment_and_string_spans(css: &str) -> Vec<Range<usize>> {
    let bytes = css.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = css[i + 2..].find("*/").map_or(bytes.len(), |at| i + 2 + at + 2);
                spans.push(i..end);
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                let mut end = i + 1;
                while end < bytes.len() && bytes[end] != quote {
                    end += if bytes[end] == b'\\' { 2 } else { 1 };
                }
                let end = (end + 1).min(bytes.len());
                spans.push(i..end);
                i = end;
            }
            _ => i += 1,
        }
    }

    spans
}

fn parse_font_arg(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("expected 1 argument, got 0".to_string());
    }

    let args = split_args(raw);
    if args.len() != 1 {
        return Err(format!("expected 1 argument, got {}", args.len()));
    }

    let value = unquote(args[0])?;
    if value.is_empty() {
        return Err("font URL is empty".to_string());
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control() || c == '\\') {
        return Err(format!("cannot parse font URL '{value}'"));
    }
    if value.contains("://") || value.starts_with("data:") || value.starts_with('/') {
        return Err(format!("font URL '{value}' must be relative to the fonts directory"));
    }

    let path = value.split(['?', '#']).next().unwrap_or_default();
    match normalize(path) {
        Some(p) if !p.is_empty() => Ok(value.to_string()),
        _ => Err(format!("font URL '{value}' leaves the fonts directory")),
    }
}

/// Split on commas that are not inside quotes.
fn split_args(raw: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut quote = None;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                args.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(raw[start..].trim());
    args
}

fn unquote(arg: &str) -> Result<&str, String> {
    for q in ['"', '\''] {
        if let Some(rest) = arg.strip_prefix(q) {
            return rest
                .strip_suffix(q)
                .ok_or_else(|| format!("unterminated string {arg}"));
        }
    }
    Ok(arg)
}

/// Compile every target and stage it as `stylesheets/<name>.css`.
pub fn stage_stylesheets(
    source: &SourceTree,
    out: &dyn OutputFs,
    overrides: String,
    rtl: bool,
    minify: bool,
) -> Result<(Vec<String>, FontSet), BuildError> {
    let (registry, targets) = scan_stylesheets(source, rtl)?;
    tracing::debug!("Registered {} partials", registry.len());

    let compiler = StyleCompiler::new(registry, overrides, minify);
    let mut fonts = FontSet::default();
    let mut staged = Vec::new();

    for target in targets {
        let input = format!("{STYLESHEETS_DIR}/{target}");
        let text = source.read_to_string(&input)?;
        let css = compiler.compile(&input, &text, &mut fonts)?;

        let name = target.trim_end_matches(".scss");
        let output = format!("{STYLESHEETS_DIR}/{name}");
        write_atomic(out, &output, css.as_bytes(), None)?;
        tracing::debug!("Compiled {}", output);
        staged.push(output);
    }

    Ok((staged, fonts))
}

/// Copy every referenced font from `fonts/` in the source tree.
pub fn stage_fonts(
    source: &SourceTree,
    out: &dyn OutputFs,
    fonts: &FontSet,
) -> Result<Vec<(String, CopyOutcome)>, BuildError> {
    let mut staged = Vec::new();

    for font in fonts.iter() {
        let path = format!("{FONTS_DIR}/{font}");
        if let Some(dir) = path.rsplit_once('/').map(|(dir, _)| dir) {
            out.create_dir_all(dir).map_err(|e| StageError::new(dir, e))?;
        }
        let outcome = copy_if_changed(source, out, &path)?;
        staged.push((path, outcome));
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;
    use quire_source::{DirLayer, Layer};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn tree(files: &[(&str, &str)]) -> (tempfile::TempDir, SourceTree) {
        let dir = tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let layer: Arc<dyn Layer> = Arc::new(DirLayer::new(dir.path()));
        (dir, SourceTree::new(vec![layer]))
    }

    fn compiler(partials: &[(&str, &str)], overrides: &str) -> StyleCompiler {
        let mut registry = ImportRegistry::default();
        for (name, source) in partials {
            registry.insert(*name, *source);
        }
        StyleCompiler::new(registry, overrides.to_string(), false)
    }

    #[test]
    fn font_url_becomes_fonts_relative() {
        let mut fonts = FontSet::default();
        let css = compiler(&[], "")
            .compile(
                "stylesheets/screen.css.scss",
                "@font-face { font-family: 'Roboto'; src: font-url(\"roboto.woff\"); }",
                &mut fonts,
            )
            .unwrap();

        assert!(css.contains("url(\"../fonts/roboto.woff\")"), "{css}");
        assert!(!css.contains("font-url"));
        assert!(fonts.contains("roboto.woff"));
        assert_eq!(fonts.len(), 1);
    }

    #[test]
    fn font_url_through_variable_keeps_query_out_of_font_set() {
        let mut fonts = FontSet::default();
        let css = compiler(&[], "")
            .compile(
                "stylesheets/screen.css.scss",
                "$icons: 'icons.woff?v=2';\n@font-face { src: font-url($icons); }",
                &mut fonts,
            )
            .unwrap();

        assert!(css.contains("../fonts/icons.woff?v=2"), "{css}");
        assert!(fonts.contains("icons.woff"));
    }

    #[test]
    fn malformed_font_url_names_the_call() {
        let mut fonts = FontSet::default();

        let err = rewrite_font_urls("screen.css", "a{src:font-url(\"a.woff\", \"b.woff\")}", &mut fonts)
            .unwrap_err();

        match err {
            BuildError::Compile { file, message } => {
                assert_eq!(file, "screen.css");
                assert!(message.contains("font-url(\"a.woff\", \"b.woff\")"), "{message}");
                assert!(message.contains("got 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn font_url_in_comments_and_strings_is_left_alone() {
        let mut fonts = FontSet::default();
        let css = "/* icons use font-url() helpers */\n\
                   a::before { content: \"font-url()\"; }\n\
                   b::after { content: 'font-url(x.woff)'; }\n\
                   /* font-url( */ @font-face { src: font-url(\"icons.woff\"); }";

        let out = rewrite_font_urls("screen.css", css, &mut fonts).unwrap();

        assert!(out.contains("/* icons use font-url() helpers */"), "{out}");
        assert!(out.contains("content: \"font-url()\""), "{out}");
        assert!(out.contains("'font-url(x.woff)'"), "{out}");
        assert!(out.contains("src: url(\"../fonts/icons.woff\")"), "{out}");
        assert_eq!(fonts.len(), 1);
        assert!(fonts.contains("icons.woff"));
    }

    #[test]
    fn loud_comment_mentioning_font_url_compiles() {
        let mut fonts = FontSet::default();

        let css = compiler(&[], "")
            .compile(
                "stylesheets/screen.css.scss",
                "/* icons use font-url() helpers */\na { color: red; }",
                &mut fonts,
            )
            .unwrap();

        assert!(css.contains("color: red"), "{css}");
        assert!(fonts.is_empty());
    }

    #[test]
    fn rejects_empty_and_absolute_font_urls() {
        assert!(parse_font_arg("").is_err());
        assert!(parse_font_arg("\"\"").is_err());
        assert!(parse_font_arg("'https://cdn.example.com/a.woff'").is_err());
        assert!(parse_font_arg("'../../etc/passwd'").is_err());
        assert!(parse_font_arg("'unterminated").is_err());
        assert_eq!(parse_font_arg(" 'a/b.ttf' ").unwrap(), "a/b.ttf");
    }

    #[test]
    fn overrides_redefine_partial_defaults() {
        let mut fonts = FontSet::default();
        let css = compiler(
            &[("variables", "$main-color: red !default;")],
            "$main-color: blue;\n",
        )
        .compile(
            "stylesheets/screen.css.scss",
            "@import 'variables';\na { color: $main-color; }",
            &mut fonts,
        )
        .unwrap();

        assert!(css.contains("blue"), "{css}");
        assert!(!css.contains("red"));
    }

    #[test]
    fn compile_errors_name_the_file() {
        let mut fonts = FontSet::default();

        let err = compiler(&[], "")
            .compile("stylesheets/bad.css.scss", "a { color: $undefined; }", &mut fonts)
            .unwrap_err();

        assert!(matches!(err, BuildError::Compile { ref file, .. } if file == "stylesheets/bad.css.scss"));
    }

    #[test]
    fn minify_strips_whitespace() {
        let css = minify_css("screen.css", "a {\n  color: #ff0000;\n}\n").unwrap();

        assert_eq!(css, "a{color:red}");
    }

    #[test]
    fn rtl_partial_is_empty_when_disabled() {
        let (_dir, source) = tree(&[
            ("stylesheets/_rtl.scss", ".content { direction: rtl; }"),
            ("stylesheets/_variables.scss", "$x: 1px !default;"),
            ("stylesheets/screen.css.scss", "@import 'rtl';\nbody { margin: 0; }"),
            ("stylesheets/notes.txt", ""),
        ]);

        let (registry, targets) = scan_stylesheets(&source, false).unwrap();
        assert_eq!(registry.get("rtl"), Some(""));
        assert_eq!(targets, vec!["screen.css.scss"]);

        let (registry, _) = scan_stylesheets(&source, true).unwrap();
        assert!(registry.get("rtl").unwrap().contains("direction"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stages_targets_and_fonts() {
        let (_dir, source) = tree(&[
            ("stylesheets/_rtl.scss", ".content { direction: rtl; }"),
            (
                "stylesheets/screen.css.scss",
                "@import 'rtl';\n@font-face { src: font-url('roboto.woff'); }",
            ),
            ("fonts/roboto.woff", "woff"),
        ]);
        let out = MemoryOutput::new();
        out.create_dir_all("stylesheets").unwrap();
        out.create_dir_all("fonts").unwrap();

        let (staged, fonts) = stage_stylesheets(&source, &out, String::new(), false, true).unwrap();
        let copied = stage_fonts(&source, &out, &fonts).unwrap();

        assert_eq!(staged, vec!["stylesheets/screen.css"]);
        assert_eq!(copied, vec![("fonts/roboto.woff".to_string(), CopyOutcome::Copied)]);

        let snapshot = out.into_snapshot();
        let css = String::from_utf8(snapshot.get("stylesheets/screen.css").unwrap().to_vec()).unwrap();
        assert!(!css.contains("direction"));
        assert!(!css.contains('\n'), "{css}");
        assert!(css.contains("../fonts/roboto.woff"));
        assert_eq!(snapshot.get("fonts/roboto.woff"), Some(&b"woff"[..]));
    }

    #[test]
    fn override_file_is_read_from_disk() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("custom.scss");
        fs::write(&file, "$nav-bg: #000;").unwrap();

        let overrides = collect_overrides(Some("$a: 1;"), Some(&file)).unwrap();

        assert_eq!(overrides, "$a: 1;\n$nav-bg: #000;\n");
        assert!(collect_overrides(None, Some(&dir.path().join("missing.scss"))).is_err());
    }
}
