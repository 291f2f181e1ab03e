//! Read-only rendering of journal text.
//!
//! Each line is classified on its own: blank, checkbox, heading, or a
//! paragraph of inline text where `{https://…png}` becomes an image and bare
//! URLs become links. There is no nesting and nothing spans lines.

use maud::{html, Markup};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::HOLIDAY_FLAG;

static TASK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^- \[([ xX])\]\s*(.*)$").expect("task pattern"));

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,3})\s+(.*)$").expect("heading pattern"));

static IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{(https?:[^\s{}]+\.(?:jpg|jpeg|png|gif))\}").expect("image pattern")
});

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:https?://)?[\w.-]+\.[a-z]{2,}\S*").expect("url pattern")
});

/// One rendered line
#[derive(Debug, PartialEq, Eq)]
pub enum Block<'a> {
    Blank,
    Task { done: bool, text: &'a str },
    Heading { level: u8, text: &'a str },
    Paragraph(Vec<Inline<'a>>),
}

/// A piece of a paragraph line
#[derive(Debug, PartialEq, Eq)]
pub enum Inline<'a> {
    Text(&'a str),
    Image(&'a str),
    Link { href: String, text: &'a str },
}

/// Classify a single line. Surrounding whitespace is ignored.
pub fn classify(line: &str) -> Block<'_> {
    let line = line.trim();

    if line.is_empty() {
        return Block::Blank;
    }

    if let Some(caps) = TASK_RE.captures(line) {
        let done = &caps[1] != " ";
        let text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return Block::Task { done, text };
    }

    if let Some(caps) = HEADING_RE.captures(line) {
        let level = caps[1].len() as u8;
        let text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return Block::Heading { level, text };
    }

    Block::Paragraph(inline_segments(line))
}

fn inline_segments(line: &str) -> Vec<Inline<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in IMAGE_RE.captures_iter(line) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        linkify(&line[last..whole.start()], &mut segments);
        segments.push(Inline::Image(url.as_str()));
        last = whole.end();
    }
    linkify(&line[last..], &mut segments);

    segments
}

fn linkify<'a>(text: &'a str, segments: &mut Vec<Inline<'a>>) {
    let mut last = 0;
    for m in URL_RE.find_iter(text) {
        if m.start() > last {
            segments.push(Inline::Text(&text[last..m.start()]));
        }
        let url = m.as_str();
        let href = if url.to_ascii_lowercase().starts_with("http") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };
        segments.push(Inline::Link { href, text: url });
        last = m.end();
    }
    if last < text.len() {
        segments.push(Inline::Text(&text[last..]));
    }
}

/// Render a text blob line by line
pub fn render_text(text: &str) -> Markup {
    html! {
        div.rendered {
            @for line in text.split('\n') {
                (render_block(&classify(line)))
            }
        }
    }
}

/// Render a journal field. With `holiday_aware`, a field holding only the
/// holiday marker renders as a banner.
pub fn render_field(text: &str, holiday_aware: bool) -> Markup {
    if holiday_aware && text.trim() == HOLIDAY_FLAG {
        return html! {
            div.holiday-banner { "🎉 Today was a Holiday!" }
        };
    }
    render_text(text)
}

fn render_block(block: &Block) -> Markup {
    match block {
        Block::Blank => html! { div.md-blank {} },
        Block::Task { done, text } => html! {
            div.md-task.done[*done] {
                input type="checkbox" disabled checked[*done];
                " "
                span { (text) }
            }
        },
        Block::Heading { level: 1, text } => html! { h1.md-heading { (text) } },
        Block::Heading { level: 2, text } => html! { h2.md-heading { (text) } },
        Block::Heading { text, .. } => html! { h3.md-heading { (text) } },
        Block::Paragraph(segments) => html! {
            p.md-line {
                @for segment in segments {
                    @match segment {
                        Inline::Text(text) => { (text) },
                        Inline::Image(src) => {
                            img.md-image src=(src) alt="img" loading="lazy";
                        },
                        Inline::Link { href, text } => {
                            a href=(href) target="_blank" rel="noopener noreferrer" { (text) }
                        },
                    }
                }
            }
        },
    }
}
