//! Content loading for quire documentation pages.
//!
//! Reads the entry document and its includes from a [`quire_source::SourceTree`],
//! parses the Markdown once, and derives the table of contents and the
//! highlighted body from the same event stream before expanding the layout.

pub mod document;
pub mod escape;
pub mod frontmatter;
pub mod highlight;
pub mod page;
pub mod params;
pub mod toc;

pub use document::{DocumentTree, ParsedDocument, Segment, SegmentOrigin, ENTRY_FILE};
pub use frontmatter::{split_front_matter, FrontMatter, FrontMatterError, LanguageTab};
pub use page::{load_document, render_body, ContentError, RenderedPage, LAYOUT_FILE};
pub use params::{BuildParameters, Minify, Toggle};
pub use toc::{TableOfContents, TocEntry};
