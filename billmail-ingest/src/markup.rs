//! Render HTML email bodies to plain text.
//!
//! Tags are dropped, entities decoded by the HTML parser, block elements and
//! `<br>` become line breaks and table cells are separated by a space.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

const SKIPPED: &[&str] = &["head", "title", "script", "style", "noscript", "template"];

const BLOCKS: &[&str] = &[
    "p", "div", "table", "tr", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "pre", "section", "article", "header", "footer", "center", "hr", "dl",
    "dt", "dd", "address",
];

const CELLS: &[&str] = &["td", "th"];

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)<(?:!doctype\s+html|html|head|body|div|p|br|table|tr|td|span|font|center|",
            r"strong|b|i|a\s+href|img|ul|ol|li|h[1-6])(?:\s[^>]*)?/?>"
        ))
        .expect("invalid markup regex")
    })
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("invalid ws regex"))
}

/// True when the body contains HTML tags rather than plain text.
pub fn looks_like_markup(text: &str) -> bool {
    markup_re().is_match(text)
}

/// Render an HTML document to plain text.
///
/// Usually shorter than the source, but not always: a few named entities
/// decode to more UTF-8 bytes than their escaped form.
pub fn markup_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    render(doc.root_element(), &mut out);

    out.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn render(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_text(out, text);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_el.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }

        let block = BLOCKS.contains(&name);
        if block {
            line_break(out);
        }
        render(child_el, out);
        if block {
            line_break(out);
        } else if CELLS.contains(&name) && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
    }
}

fn push_text(out: &mut String, text: &str) {
    let text = text.replace('\u{00a0}', " ");
    let collapsed = ws_re().replace_all(&text, " ");
    if collapsed == " " && (out.is_empty() || out.ends_with([' ', '\n'])) {
        return;
    }
    out.push_str(&collapsed);
}

fn line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
