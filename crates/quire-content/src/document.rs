//! The entry document and its includes.

use std::collections::HashSet;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};
use quire_source::SourceTree;

use crate::escape::escape_html;
use crate::frontmatter::{split_front_matter, FrontMatter};
use crate::page::ContentError;

/// Entry file at the root of the source tree.
pub const ENTRY_FILE: &str = "index.html.md";

/// Source path of the include called `name`.
pub fn include_path(name: &str) -> String {
    format!("includes/_{name}.md")
}

/// Where a body segment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOrigin {
    Entry,
    Include(String),
}

/// One piece of the combined Markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub origin: SegmentOrigin,
    pub text: String,
}

/// Front matter plus the body segments in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub front_matter: FrontMatter,
    pub segments: Vec<Segment>,
}

impl ParsedDocument {
    /// Read the entry file and every include it declares.
    ///
    /// A missing include fails the whole document.
    pub fn read(source: &SourceTree) -> Result<Self, ContentError> {
        let entry = source.read_to_string(ENTRY_FILE)?;
        let (front_matter, body) = split_front_matter(&entry)?;

        let mut segments = vec![Segment {
            origin: SegmentOrigin::Entry,
            text: body,
        }];

        for name in &front_matter.includes {
            let text = source.read_to_string(&include_path(name))?;
            tracing::debug!("Included {}", name);
            segments.push(Segment {
                origin: SegmentOrigin::Include(name.clone()),
                text,
            });
        }

        Ok(Self {
            front_matter,
            segments,
        })
    }

    /// The combined Markdown source.
    ///
    /// Every include is followed by a newline so a file without a trailing
    /// one cannot run into the next.
    pub fn markdown(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.text);
            if matches!(segment.origin, SegmentOrigin::Include(_)) {
                out.push('\n');
            }
        }
        out
    }
}

/// The parsed event stream of a document, shared by the TOC and body passes.
#[derive(Debug, Clone)]
pub struct DocumentTree<'a> {
    events: Vec<Event<'a>>,
}

impl<'a> DocumentTree<'a> {
    /// Parse Markdown once and assign every heading a unique id.
    pub fn parse(markdown: &'a str) -> Self {
        let (title, rest) = split_title_block(markdown);

        let mut events = Vec::new();
        if let Some(title) = title {
            events.push(Event::Html(CowStr::from(format!(
                "<h1 class=\"title\">{}</h1>\n",
                escape_html(&title)
            ))));
        }
        events.extend(Parser::new_ext(rest, markdown_options()));
        assign_heading_ids(&mut events);

        Self { events }
    }

    pub fn events(&self) -> &[Event<'a>] {
        &self.events
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Split off a leading Pandoc title block (`% Title` lines).
fn split_title_block(markdown: &str) -> (Option<String>, &str) {
    let mut end = 0;
    let mut lines = Vec::new();

    for line in markdown.split_inclusive('\n') {
        let Some(text) = line.strip_prefix('%') else {
            break;
        };
        lines.push(text.trim());
        end += line.len();
    }

    if lines.is_empty() {
        return (None, markdown);
    }
    (Some(lines.join(" ")), &markdown[end..])
}

/// Give every heading an id, keeping explicit `{#id}` attributes.
fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut used = HashSet::new();
    let mut i = 0;

    while i < events.len() {
        if !matches!(events[i], Event::Start(Tag::Heading { .. })) {
            i += 1;
            continue;
        }

        let mut text = String::new();
        let mut end = i + 1;
        while end < events.len() {
            match &events[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            end += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            let base = match id.take() {
                Some(explicit) => explicit.to_string(),
                None => slugify(&text),
            };
            *id = Some(CowStr::from(unique_id(base, &mut used)));
        }

        i = end + 1;
    }
}

/// Convert heading text to an anchor id.
///
/// Runs of anything other than letters and digits become a single dash.
fn slugify(text: &str) -> String {
    let slug = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
