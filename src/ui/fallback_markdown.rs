//! Minimal markdown-to-HTML conversion used when the rich renderer is disabled.
//!
//! Supports fenced code, inline code, bold, italic, and flat bulleted or
//! numbered lists. Everything else is escaped text. This is deliberately a
//! small subset; headings, links, tables, and nesting are not recognised.

use super::renderer::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Paragraph(Vec<String>),
    Code {
        language: String,
        lines: Vec<String>,
    },
    List {
        ordered: bool,
        items: Vec<String>,
    },
}

/// Render `text` with the restricted markdown subset.
///
/// A single line of plain text comes back escaped with no wrapping element.
/// Multi-line text without any markup gets exactly one `<p>`, blank lines
/// included; paragraphs are only split once some markup is present.
pub fn render(text: &str) -> String {
    let blocks = parse_blocks(text);

    if let [Block::Paragraph(lines)] = blocks.as_slice() {
        if lines.len() == 1 {
            return render_inline(&lines[0]);
        }
    }
    if !blocks.is_empty() && is_plain(&blocks) {
        return format!("<p>{}</p>", escape_html(text.trim()));
    }

    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Only paragraphs, and no line renders differently from its escaped text.
fn is_plain(blocks: &[Block]) -> bool {
    blocks.iter().all(|block| match block {
        Block::Paragraph(lines) => lines
            .iter()
            .all(|line| render_inline(line) == escape_html(line)),
        Block::Code { .. } | Block::List { .. } => false,
    })
}

fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();

        if let Some(info) = trimmed.strip_prefix("```") {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut code_lines = Vec::new();
            // An unterminated fence runs to the end of the text.
            for code_line in lines.by_ref() {
                if code_line.trim_start().starts_with("```") {
                    break;
                }
                code_lines.push(code_line.to_string());
            }
            blocks.push(Block::Code {
                language: sanitize_language(info),
                lines: code_lines,
            });
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some((ordered, item)) = list_item(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            match blocks.last_mut() {
                Some(Block::List {
                    ordered: current,
                    items,
                }) if *current == ordered => items.push(item.to_string()),
                _ => blocks.push(Block::List {
                    ordered,
                    items: vec![item.to_string()],
                }),
            }
            continue;
        }

        paragraph.push(line.to_string());
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(paragraph: &mut Vec<String>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(std::mem::take(paragraph)));
    }
}

/// Returns `(ordered, item_text)` for `- x`, `* x`, `+ x`, `1. x`, and `1) x`.
fn list_item(line: &str) -> Option<(bool, &str)> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(item) = line.strip_prefix(marker) {
            return Some((false, item.trim_start()));
        }
    }

    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(|item| (true, item.trim_start()))
}

fn sanitize_language(info: &str) -> String {
    info.trim()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.'))
        .collect()
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Paragraph(lines) => {
            let body = lines
                .iter()
                .map(|line| render_inline(line))
                .collect::<Vec<_>>()
                .join("\n");
            format!("<p>{body}</p>")
        }
        Block::Code { language, lines } => {
            let body = escape_html(&lines.join("\n"));
            if language.is_empty() {
                format!("<pre><code>{body}</code></pre>")
            } else {
                format!("<pre><code class=\"language-{language}\">{body}</code></pre>")
            }
        }
        Block::List { ordered, items } => {
            let tag = if *ordered { "ol" } else { "ul" };
            let body: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", render_inline(item)))
                .collect();
            format!("<{tag}>{body}</{tag}>")
        }
    }
}

/// Inline code spans first, then emphasis on the text between them.
fn render_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('`') {
        let after_open = &rest[open + 1..];
        match after_open.find('`') {
            Some(close) if close > 0 => {
                out.push_str(&render_emphasis(&rest[..open]));
                out.push_str("<code>");
                out.push_str(&escape_html(&after_open[..close]));
                out.push_str("</code>");
                rest = &after_open[close + 1..];
            }
            _ => {
                out.push_str(&render_emphasis(&rest[..=open]));
                rest = after_open;
            }
        }
    }

    out.push_str(&render_emphasis(rest));
    out
}

fn render_emphasis(text: &str) -> String {
    let escaped = escape_html(text);
    let bold = replace_pairs(&escaped, "**", "strong", false);
    let italic = replace_pairs(&bold, "*", "em", false);
    replace_pairs(&italic, "_", "em", true)
}

/// Wrap `delim ... delim` runs in `<tag>`. Content may not be empty or start
/// or end with whitespace. `word_bound` delimiters must not touch
/// alphanumerics on their outer side, so `snake_case_names` stay intact.
fn replace_pairs(text: &str, delim: &str, tag: &str, word_bound: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(delim) {
        let open = cursor + rel;
        let content_start = open + delim.len();

        let opens_word = !word_bound || boundary_before(text, open);
        match opens_word
            .then(|| find_closing(text, content_start, delim, word_bound))
            .flatten()
        {
            Some(close) => {
                out.push_str(&text[cursor..open]);
                out.push('<');
                out.push_str(tag);
                out.push('>');
                out.push_str(&text[content_start..close]);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
                cursor = close + delim.len();
            }
            None => {
                out.push_str(&text[cursor..content_start]);
                cursor = content_start;
            }
        }
    }

    out.push_str(&text[cursor..]);
    out
}

fn find_closing(text: &str, from: usize, delim: &str, word_bound: bool) -> Option<usize> {
    let mut search = from;
    while let Some(rel) = text[search..].find(delim) {
        let close = search + rel;
        let content = &text[from..close];
        let well_formed = !content.is_empty()
            && !content.starts_with(char::is_whitespace)
            && !content.ends_with(char::is_whitespace);
        if well_formed && (!word_bound || boundary_after(text, close + delim.len())) {
            return Some(close);
        }
        search = close + delim.len();
    }
    None
}

fn boundary_before(text: &str, idx: usize) -> bool {
    text[..idx]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric())
}

fn boundary_after(text: &str, idx: usize) -> bool {
    text[idx..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric())
}
