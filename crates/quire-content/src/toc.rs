//! Table of contents extraction.

use std::fmt::Write as _;

use pulldown_cmark::{html, Event, Tag, TagEnd};

use crate::escape::escape_html;

/// Deepest heading level listed in the table of contents.
pub const MAX_LEVEL: u8 = 2;

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Heading level (1-2)
    pub level: u8,
    /// Anchor ID
    pub id: String,
    /// Escaped heading HTML
    pub title: String,
}

/// Headings of a document in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    pub entries: Vec<TocEntry>,
}

/// A heading whose content is still being captured.
struct OpenHeading<'a> {
    level: u8,
    id: String,
    captured: Vec<Event<'a>>,
}

/// Walk state: the finished entries and the heading currently open.
#[derive(Default)]
struct TocCollector<'a> {
    entries: Vec<TocEntry>,
    open: Option<OpenHeading<'a>>,
}

impl<'a> TocCollector<'a> {
    fn visit(&mut self, event: &Event<'a>) {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) if (*level as u8) <= MAX_LEVEL => {
                self.open = Some(OpenHeading {
                    level: *level as u8,
                    id: id.as_deref().unwrap_or_default().to_string(),
                    captured: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(level)) if (*level as u8) <= MAX_LEVEL => {
                if let Some(heading) = self.open.take() {
                    self.entries.push(close(heading));
                }
            }
            other => {
                if let Some(heading) = &mut self.open {
                    heading.captured.push(other.clone());
                }
            }
        }
    }
}

fn close(heading: OpenHeading<'_>) -> TocEntry {
    let mut inner = String::new();
    html::push_html(&mut inner, heading.captured.into_iter());
    TocEntry {
        level: heading.level,
        id: heading.id,
        title: escape_html(inner.trim()),
    }
}

impl TableOfContents {
    /// Collect level 1-2 headings from a parsed event stream.
    pub fn collect(events: &[Event<'_>]) -> Self {
        let mut collector = TocCollector::default();
        for event in events {
            collector.visit(event);
        }
        Self {
            entries: collector.entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as nested list items.
    ///
    /// The output sits inside the layout's outer `<ul>`. A deeper heading
    /// opens one nested list per level, a shallower one closes as many.
    pub fn to_html(&self) -> String {
        let Some(first) = self.entries.first() else {
            return String::new();
        };

        let base = first.level;
        let mut html = String::new();
        let mut current = base;

        for (i, entry) in self.entries.iter().enumerate() {
            let level = entry.level.max(base);

            if i > 0 {
                if level > current {
                    for nested in current + 1..=level {
                        let _ = writeln!(html, "<ul class=\"toc-list-h{}\">", nested);
                    }
                } else {
                    for _ in level..current {
                        html.push_str("</li>\n</ul>\n");
                    }
                    html.push_str("</li>\n");
                }
            }
            current = level;

            let _ = write!(
                html,
                "<li>\n<a href=\"#{id}\" class=\"toc-h{level} toc-link\" data-title=\"{title}\">{title}</a>\n",
                id = entry.id,
                level = entry.level,
                title = entry.title,
            );
        }

        for _ in base..current {
            html.push_str("</li>\n</ul>\n");
        }
        html.push_str("</li>\n");

        html
    }
}
