//! Page rendering: body HTML, code blocks and the layout template.

use minijinja::{context, Environment};
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Tag, TagEnd};
use quire_source::{SourceError, SourceTree};

use crate::document::{DocumentTree, ParsedDocument};
use crate::escape::escape_html;
use crate::frontmatter::{FrontMatter, FrontMatterError};
use crate::highlight::{highlight_code, stylesheet};
use crate::params::BuildParameters;
use crate::toc::TableOfContents;

/// Layout template wrapped around the rendered body.
pub const LAYOUT_FILE: &str = "layouts/layout.html";

/// Errors that can occur while loading and rendering the page.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),

    #[error("Template error in layouts/layout.html: {0}")]
    Template(String),
}

/// The fully rendered entry page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub html: String,
}

impl RenderedPage {
    /// Page bytes, minified when requested.
    pub fn to_bytes(&self, minify: bool) -> Vec<u8> {
        if !minify {
            return self.html.clone().into_bytes();
        }

        let mut cfg = minify_html::Cfg::new();
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.minify_css = true;
        cfg.minify_js = true;
        minify_html::minify(self.html.as_bytes(), &cfg)
    }
}

/// Load the entry document and render the complete page.
///
/// The layout is resolved first so a missing template fails before any
/// content is read. Overrides from `params` are applied to the returned
/// front matter, which later build steps read their flags from.
pub fn load_document(
    source: &SourceTree,
    params: &BuildParameters,
) -> Result<(ParsedDocument, RenderedPage), ContentError> {
    let layout = source.read_to_string(LAYOUT_FILE)?;

    let mut doc = ParsedDocument::read(source)?;
    doc.front_matter.apply(params);

    let markdown = doc.markdown();
    let tree = DocumentTree::parse(&markdown);
    let toc = TableOfContents::collect(tree.events());
    let body = render_body(tree.events());

    let html = render_layout(layout, &doc.front_matter, &toc.to_html(), &body)?;

    Ok((doc, RenderedPage { html }))
}

fn render_layout(
    template: String,
    front_matter: &FrontMatter,
    toc: &str,
    content: &str,
) -> Result<String, ContentError> {
    let mut env = Environment::new();
    env.add_template_owned(LAYOUT_FILE, template)
        .map_err(|e| ContentError::Template(e.to_string()))?;

    let tmpl = env
        .get_template(LAYOUT_FILE)
        .map_err(|e| ContentError::Template(e.to_string()))?;

    tmpl.render(context! {
        params => front_matter,
        toc => toc,
        content => content,
        highlight_css => stylesheet(front_matter.highlight_theme.as_deref()),
        language_tabs => &front_matter.language_tabs,
    })
    .map_err(|e| ContentError::Template(e.to_string()))
}

/// A fenced block whose source is still being collected.
struct PendingBlock {
    lang: String,
    source: String,
}

impl PendingBlock {
    fn new(kind: &CodeBlockKind<'_>) -> Self {
        let lang = match kind {
            CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or_default(),
            CodeBlockKind::Indented => "",
        };
        Self {
            lang: lang.to_string(),
            source: String::new(),
        }
    }

    fn to_html(&self) -> String {
        let class = if self.lang.is_empty() {
            "plaintext".to_string()
        } else {
            escape_html(&self.lang)
        };
        format!(
            "\n<pre class=\"highlight {class} tab-{class}\"><code>{}</code></pre>\n",
            highlight_code(&self.lang, &self.source)
        )
    }
}

/// Walk state for the body pass.
#[derive(Default)]
struct BodyRenderer<'a> {
    out: Vec<Event<'a>>,
    code: Option<PendingBlock>,
}

impl<'a> BodyRenderer<'a> {
    fn visit(&mut self, event: &Event<'a>) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => self.code = Some(PendingBlock::new(kind)),
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = self.code.take() {
                    self.out.push(Event::Html(CowStr::from(block.to_html())));
                }
            }
            Event::Text(text) => match &mut self.code {
                Some(block) => block.source.push_str(text),
                None => self.out.push(event.clone()),
            },
            other => self.out.push(other.clone()),
        }
    }
}

/// Render the document body, highlighting fenced code blocks.
pub fn render_body(events: &[Event<'_>]) -> String {
    let mut renderer = BodyRenderer::default();
    for event in events {
        renderer.visit(event);
    }

    let mut body = String::new();
    html::push_html(&mut body, renderer.out.into_iter());
    body
}
