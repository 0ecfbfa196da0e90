//! Email body normalization: keep the transactional text, drop everything else.
//!
//! Steps run in a fixed order, each on the previous step's output:
//! markup rendering, forwarded-message cut, reply-attribution cut, quote-line
//! removal, signature cut, boilerplate removal, blank-line collapse. A step
//! whose pattern is absent leaves the text untouched.
//!
//! One pass can expose new work for the next (a decoded `&lt;b&gt;`, a `--`
//! line left behind by boilerplate removal), so passes repeat until the text
//! stops changing. A pass either returns its input unchanged or strictly
//! shorter, which bounds the loop and keeps the result no longer than the
//! input.

use billmail_core::NormalizedBody;
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

use crate::markup::{looks_like_markup, markup_to_text};

fn forwarded_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?mi)^[ \t]*-{2,}[ \t]*forwarded message[ \t]*-*[ \t]*$",
            r"|^[ \t]*begin forwarded message:"
        ))
        .expect("invalid forwarded regex")
    })
}

fn reply_attribution_re() -> &'static Regex {
    // "On Thu, Sep 4, 2025 at 4:29 PM Chase <no.reply@chase.com> wrote:"
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*On[ \t][^\n]*\bwrote:[ \t]*$").expect("invalid reply regex")
    })
}

fn signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*--[ \t]*$").expect("invalid signature regex"))
}

fn boilerplate_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?is)You are receiving this alert because.*?account\.",
            r"(?i)Review account",
            r"(?i)Securely access your accounts with[^\n]*",
            r"(?is)About this message.*",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("invalid boilerplate regex"))
        .collect()
    })
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n(?:[ \t]*\n){3,}").expect("invalid blank-line regex"))
}

/// Normalize a raw email body.
pub fn normalize(raw_body: &str) -> NormalizedBody {
    let mut text = normalize_pass(raw_body);
    loop {
        let next = normalize_pass(&text);
        if next == text {
            break;
        }
        text = next;
    }
    NormalizedBody::from_normalized(text)
}

fn normalize_pass(body: &str) -> String {
    let mut text = body.replace("\r\n", "\n");

    if looks_like_markup(&text) {
        let rendered = markup_to_text(&text);
        // entities can decode to more bytes than they were written with
        if rendered.len() < text.len() {
            trace!(len = rendered.len(), "rendered markup body");
            text = rendered;
        } else {
            trace!(len = text.len(), "rendered markup not shorter, kept as text");
        }
    }

    let text = truncate_at(&text, forwarded_re());
    let text = truncate_at(text, reply_attribution_re());
    let text = strip_quoted_lines(text);
    let text = truncate_at(&text, signature_re());
    let text = strip_boilerplate(text);
    let text = blank_run_re().replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Everything before the first match of `re`
fn truncate_at<'a>(text: &'a str, re: &Regex) -> &'a str {
    match re.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

/// Drop every line that starts with a `>` quote marker.
fn strip_quoted_lines(text: &str) -> String {
    if !text.lines().any(is_quote_line) {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !is_quote_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_quote_line(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

fn strip_boilerplate(text: &str) -> String {
    boilerplate_res()
        .iter()
        .fold(text.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHASE_SENT: &str = "You sent $1,635.00 to Testing VILLAGE from account ending in (...3925)\nSent on Sep 4, 2025 at 4:29 PM ET";

    #[test]
    fn test_clean_body_is_unchanged() {
        assert_eq!(normalize(CHASE_SENT).as_str(), CHASE_SENT);
    }

    #[test]
    fn test_strips_quote_lines() {
        let body = "Paid $20.00 to ACME\n> On earlier mail\n>> nested quote\n  > indented quote\nThanks";
        let out = normalize(body);
        assert_eq!(out.as_str(), "Paid $20.00 to ACME\nThanks");
    }

    #[test]
    fn test_truncates_forwarded_message() {
        let body = "FYI\n\n---------- Forwarded message ---------\nFrom: Chase\nYou sent $5.00";
        assert_eq!(normalize(body).as_str(), "FYI");

        let body = "see below\nBegin forwarded message:\n\nFrom: Chase";
        assert_eq!(normalize(body).as_str(), "see below");
    }

    #[test]
    fn test_truncates_reply_attribution() {
        let body = "Looks right.\n\nOn Thu, Sep 4, 2025 at 4:29 PM Chase <no.reply@chase.com> wrote:\nYou sent $1,635.00";
        assert_eq!(normalize(body).as_str(), "Looks right.");
    }

    #[test]
    fn test_truncates_signature() {
        let body = "You sent $12.00 to ACME\n-- \nJane Doe\nSent from my phone";
        assert_eq!(normalize(body).as_str(), "You sent $12.00 to ACME");
    }

    #[test]
    fn test_dash_lines_that_are_not_signatures_survive() {
        let body = "Amount --- $12.00\n---\ndone";
        assert_eq!(normalize(body).as_str(), body);
    }

    #[test]
    fn test_removes_chase_boilerplate() {
        let body = "You sent $1,635.00 to Testing VILLAGE\n\
Review account\n\
Securely access your accounts with the Chase Mobile® app or chase.com.\n\
You are receiving this alert because you chose to get notified about your\naccount.\n\
\n\
About this message\nChase Privacy Operations, PO Box 659752";
        let out = normalize(body);
        assert_eq!(out.as_str(), "You sent $1,635.00 to Testing VILLAGE");
    }

    #[test]
    fn test_collapses_blank_runs() {
        let body = "\n\nline one\n\n\n\n\nline two\n\n\nline three\n  \n\t\n \n\nline four\n\n";
        let out = normalize(body);
        assert_eq!(out.as_str(), "line one\n\nline two\n\n\nline three\n\nline four");
    }

    #[test]
    fn test_normalizes_html_alert() {
        let body = "<html><body><table><tr><td>You sent $1,635.00 to Testing VILLAGE</td></tr>\
<tr><td>Sent on</td><td>Sep 4, 2025 at 4:29 PM ET</td></tr></table>\
<p>Review account</p><p>About this message</p><p>Chase Privacy Operations</p></body></html>";
        let out = normalize(body);
        assert_eq!(
            out.as_str(),
            "You sent $1,635.00 to Testing VILLAGE\nSent on Sep 4, 2025 at 4:29 PM ET"
        );
    }

    #[test]
    fn test_crlf_bodies() {
        let body = "You sent $3.00\r\n> quoted\r\n-- \r\nsig";
        assert_eq!(normalize(body).as_str(), "You sent $3.00");
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("").is_empty());
        assert!(normalize("  \n\n ").is_empty());
    }

    #[test]
    fn test_indented_signature_is_cut() {
        assert_eq!(normalize("  --\nYou sent $5.00 to ACME").as_str(), "");
        assert_eq!(normalize("You sent $5.00\n  -- \nJane").as_str(), "You sent $5.00");
    }

    #[test]
    fn test_boilerplate_removal_exposing_signature() {
        let body = "You sent $5.00 to ACME\n-Review account-\nJane";
        assert_eq!(normalize(body).as_str(), "You sent $5.00 to ACME");

        let body = "You sent $5.00 to ACME\nReview account> old quote\nThanks";
        assert_eq!(normalize(body).as_str(), "You sent $5.00 to ACME\nThanks");
    }

    #[test]
    fn test_escaped_markup_is_rendered_fully() {
        let body = "<p>&lt;b&gt;You sent $5.00&lt;/b&gt;</p>";
        assert_eq!(normalize(body).as_str(), "You sent $5.00");
    }

    #[test]
    fn test_entities_that_grow_keep_the_source_text() {
        let body = format!("<b>{}</b>", "&nGt;".repeat(10));
        let out = normalize(&body);
        assert!(out.as_str().len() <= body.len());
        assert_eq!(normalize(out.as_str()), out);
    }

    #[test]
    fn test_idempotent_and_never_longer() {
        let bodies = [
            CHASE_SENT,
            "a\n\n\n\n\nb",
            "Paid\n> quoted\nThanks\n--\nsig",
            "x\nOn Mon, Jan 1, 2024 Bob wrote:\n> hi",
            "<div>Amount&nbsp;<b>$5.00</b></div><br><br><br><br><div>ACME</div>",
            "Review account Review account\n\n\n\nYou sent $1.00",
            "   leading and trailing   ",
            "  --\nYou sent $5.00 to ACME",
            "You sent $5.00 to ACME\n-Review account-\nJane",
            "<p>&lt;b&gt;You sent $5.00&lt;/b&gt;</p>",
            "",
        ];
        for body in bodies {
            let once = normalize(body);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {body:?}");
            assert!(once.as_str().len() <= body.len(), "grew for {body:?}");
        }
    }
}
