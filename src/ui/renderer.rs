//! Markdown rendering for assistant bubbles.
//!
//! The renderer is picked once from configuration. [`Renderer::Rich`] runs
//! pulldown-cmark with raw HTML neutralised; [`Renderer::Fallback`] uses the
//! restricted converter in [`super::fallback_markdown`].

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};

use super::fallback_markdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Rich,
    Fallback,
}

impl RendererKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RendererKind::Rich => "rich",
            RendererKind::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rich" | "markdown" => Some(RendererKind::Rich),
            "fallback" | "basic" => Some(RendererKind::Fallback),
            _ => None,
        }
    }
}

/// Sanitising CommonMark renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RichRenderer;

impl RichRenderer {
    pub fn render(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let events = Parser::new_ext(text, options).map(sanitize_event);
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::push_html(&mut out, events);
        out
    }
}

/// Restricted built-in renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRenderer;

impl FallbackRenderer {
    pub fn render(&self, text: &str) -> String {
        fallback_markdown::render(text)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Renderer {
    Rich(RichRenderer),
    Fallback(FallbackRenderer),
}

impl Renderer {
    pub fn from_kind(kind: RendererKind) -> Self {
        match kind {
            RendererKind::Rich => Renderer::Rich(RichRenderer),
            RendererKind::Fallback => Renderer::Fallback(FallbackRenderer),
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            Renderer::Rich(_) => RendererKind::Rich,
            Renderer::Fallback(_) => RendererKind::Fallback,
        }
    }

    pub fn render(&self, text: &str) -> String {
        match self {
            Renderer::Rich(renderer) => renderer.render(text),
            Renderer::Fallback(renderer) => renderer.render(text),
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::from_kind(RendererKind::default())
    }
}

/// Escape `&`, `<`, and `>`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if scheme.starts_with("javascript:") || scheme.starts_with("vbscript:") || scheme.starts_with("data:") {
        CowStr::Borrowed("#")
    } else {
        url
    }
}
