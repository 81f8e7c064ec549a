//! Lexical highlighting for fenced code blocks.
//!
//! Tokens are classified into short Pygments-style classes (`k`, `s`,
//! `c`, ...) so the stylesheet of any theme can target them.

use std::fmt::Write as _;
use std::sync::LazyLock;

use syntect::easy::ScopeRegionIterator;
use syntect::highlighting::{Color, FontStyle, Highlighter, Theme, ThemeSet};
use syntect::parsing::{ParseState, Scope, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::escape::escape_html;

/// Theme used when front matter names none, or an unknown one.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEMES: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Scope selectors and the class they map to, most specific first.
const CATEGORIES: &[(&str, &str)] = &[
    ("comment", "c"),
    ("string.regexp", "sr"),
    ("string", "s"),
    ("constant.character.escape", "se"),
    ("constant.numeric", "m"),
    ("constant.language", "kc"),
    ("constant.character", "sc"),
    ("constant", "no"),
    ("keyword.operator", "o"),
    ("keyword", "k"),
    ("storage.type", "kt"),
    ("storage", "kd"),
    ("entity.name.function", "nf"),
    ("entity.name.tag", "nt"),
    ("entity.name.class", "nc"),
    ("entity.name.type", "nc"),
    ("entity.name.namespace", "nn"),
    ("entity.other.attribute-name", "na"),
    ("entity.other.inherited-class", "nc"),
    ("entity.name", "nx"),
    ("support.function", "nb"),
    ("support.class", "nc"),
    ("support", "nb"),
    ("variable.parameter", "nv"),
    ("variable.language", "bp"),
    ("variable", "nv"),
    ("markup.heading", "gh"),
    ("markup.inserted", "gi"),
    ("markup.deleted", "gd"),
    ("markup.bold", "gs"),
    ("markup.italic", "ge"),
    ("invalid", "err"),
];

static CATEGORY_SCOPES: LazyLock<Vec<(Scope, &'static str)>> = LazyLock::new(|| {
    CATEGORIES
        .iter()
        .filter_map(|(selector, class)| Scope::new(selector).ok().map(|s| (s, *class)))
        .collect()
});

/// Highlight `code` as `lang`, returning the inner HTML of a `<code>` element.
///
/// Never fails: an unknown language is lexed as plain text, and a lexer
/// error yields the escaped source unchanged.
pub fn highlight_code(lang: &str, code: &str) -> String {
    match tokenize(syntax_for(lang), code) {
        Ok(html) => html,
        Err(message) => {
            tracing::debug!("Highlighting '{}' failed, emitting plain text: {}", lang, message);
            escape_html(code)
        }
    }
}

fn syntax_for(lang: &str) -> &'static SyntaxReference {
    if lang.is_empty() {
        return SYNTAXES.find_syntax_plain_text();
    }

    SYNTAXES.find_syntax_by_token(lang).unwrap_or_else(|| {
        tracing::debug!("No lexer for '{}', using plain text", lang);
        SYNTAXES.find_syntax_plain_text()
    })
}

fn tokenize(syntax: &SyntaxReference, code: &str) -> Result<String, String> {
    let mut state = ParseState::new(syntax);
    let mut stack = ScopeStack::new();
    let mut out = String::with_capacity(code.len() * 2);

    for line in LinesWithEndings::from(code) {
        let ops = state
            .parse_line(line, &SYNTAXES)
            .map_err(|e| format!("{e:?}"))?;

        for (text, op) in ScopeRegionIterator::new(&ops, line) {
            stack.apply(op).map_err(|e| format!("{e:?}"))?;
            if text.is_empty() {
                continue;
            }
            match classify(stack.as_slice()) {
                Some(class) => {
                    let _ = write!(out, "<span class=\"{}\">{}</span>", class, escape_html(text));
                }
                None => out.push_str(&escape_html(text)),
            }
        }
    }

    Ok(out)
}

/// Class of the innermost scope that falls into a known category.
fn classify(stack: &[Scope]) -> Option<&'static str> {
    stack.iter().rev().find_map(|scope| {
        CATEGORY_SCOPES
            .iter()
            .find(|(category, _)| category.is_prefix_of(*scope))
            .map(|(_, class)| *class)
    })
}

/// CSS rules colouring the highlight classes with the given theme.
///
/// Empty when no theme can be resolved.
pub fn stylesheet(theme: Option<&str>) -> String {
    match resolve_theme(&THEMES, theme.unwrap_or(DEFAULT_THEME)) {
        Some(theme) => theme_rules(theme),
        None => String::new(),
    }
}

fn theme_rules(theme: &Theme) -> String {
    let highlighter = Highlighter::new(theme);
    let default_fg = theme.settings.foreground;

    let mut css = String::new();
    if let Some(bg) = theme.settings.background {
        let _ = write!(css, "\n.highlight pre {{ background-color: {}; }}", hex(bg));
        let _ = write!(css, "\n.highlight .hll {{ background-color: {}; }}", hex(bg));
    }
    if let Some(fg) = default_fg {
        let _ = write!(css, "\n.highlight, .highlight pre {{ color: {}; }}", hex(fg));
    }

    let mut seen: Vec<&str> = Vec::new();
    for (scope, class) in CATEGORY_SCOPES.iter() {
        if seen.contains(class) {
            continue;
        }
        seen.push(class);

        let style = highlighter.style_for_stack(&[*scope]);
        let mut rules = Vec::new();
        if Some(style.foreground) != default_fg {
            rules.push(format!("color: {}", hex(style.foreground)));
        }
        if style.font_style.contains(FontStyle::BOLD) {
            rules.push("font-weight: bold".to_string());
        }
        if style.font_style.contains(FontStyle::ITALIC) {
            rules.push("font-style: italic".to_string());
        }
        if style.font_style.contains(FontStyle::UNDERLINE) {
            rules.push("text-decoration: underline".to_string());
        }
        if !rules.is_empty() {
            let _ = write!(css, "\n.highlight .{} {{ {} }}", class, rules.join("; "));
        }
    }

    css
}

fn resolve_theme<'a>(themes: &'a ThemeSet, name: &str) -> Option<&'a Theme> {
    if let Some(theme) = themes.themes.get(name) {
        return Some(theme);
    }
    tracing::warn!("Unknown highlight theme '{}', using {}", name, DEFAULT_THEME);
    let fallback = themes
        .themes
        .get(DEFAULT_THEME)
        .or_else(|| themes.themes.values().next());
    if fallback.is_none() {
        tracing::warn!("No highlight themes available, skipping highlight styles");
    }
    fallback
}

fn hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_keywords_and_strings() {
        let html = highlight_code("rust", "fn main() { let s = \"hi\"; }\n");

        assert!(html.contains("<span class=\"k"), "{html}");
        assert!(html.contains("<span class=\"s\">"), "{html}");
        assert!(html.contains("main"));
    }

    #[test]
    fn escapes_token_text() {
        let html = highlight_code("html", "<b>&</b>\n");

        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;"));
        assert!(html.contains("&amp;"));
    }

    #[test]
    fn unknown_language_falls_back_to_plain_text() {
        let html = highlight_code("no-such-language-xyz", "a < b\n");

        assert_eq!(html, "a &lt; b\n");
    }

    #[test]
    fn empty_language_is_plain_text() {
        assert_eq!(highlight_code("", "plain\n"), "plain\n");
    }

    #[test]
    fn classifies_from_innermost_scope() {
        let string = Scope::new("string.quoted.double.rust").unwrap();
        let punct = Scope::new("punctuation.definition.string.begin.rust").unwrap();
        let source = Scope::new("source.rust").unwrap();

        assert_eq!(classify(&[source, string, punct]), Some("s"));
        assert_eq!(classify(&[source]), None);
    }

    #[test]
    fn stylesheet_targets_highlight_classes() {
        let css = stylesheet(None);

        assert!(css.contains(".highlight pre"));
        assert!(css.contains(".highlight .c "));
    }

    #[test]
    fn unknown_theme_uses_default() {
        assert_eq!(stylesheet(Some("no-such-theme")), stylesheet(Some(DEFAULT_THEME)));
        assert!(THEMES.themes.contains_key(DEFAULT_THEME));
    }

    #[test]
    fn empty_theme_set_resolves_to_nothing() {
        let empty = ThemeSet::default();

        assert!(resolve_theme(&empty, DEFAULT_THEME).is_none());
        assert!(resolve_theme(&THEMES, "no-such-theme").is_some());
    }
}
