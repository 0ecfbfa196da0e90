//! Amount coercion: "$1,635.00" -> 1635.0

use regex::Regex;
use std::sync::OnceLock;

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:usd|us|eur|gbp|cad|cny|rmb)\b|[$€£¥￥\s\u{00a0}]")
            .expect("invalid currency regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d{1,3}(?:,\d{3})+|\d+)?(?:\.\d+)?$").expect("invalid number regex")
    })
}

/// Coerce a monetary string into a non-negative amount.
///
/// Currency symbols and codes, whitespace and thousands separators are removed.
/// A sign or accounting parentheses are accepted and dropped: the record stores
/// the magnitude. Returns `None` when no well-formed number remains.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s = currency_re().replace_all(raw.trim(), "").to_string();

    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        s = s[1..s.len() - 1].to_string();
    }
    if !s.chars().any(|c| c.is_ascii_digit()) || !number_re().is_match(&s) {
        return None;
    }

    let value: f64 = s.replace(',', "").parse().ok()?;
    amount_from_number(value)
}

/// Validate a numeric amount: finite, stored as magnitude.
pub fn amount_from_number(value: f64) -> Option<f64> {
    if value.is_finite() { Some(value.abs()) } else { None }
}
