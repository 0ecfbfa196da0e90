//! Coerce a free-form model answer into a `BillRecord`.
//!
//! Whole-answer problems (no JSON, wrong shape) are errors. Problems with a
//! single field null that field and log a warning; the rest of the record
//! survives.

use billmail_core::{
    ANSWER_MARKER, BillError, BillRecord, COMPLETED_MARKER, Category, CategorySchema,
    amount_from_number, normalize_date, parse_amount,
};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::warn;

/// Wrapper key the model may nest the record under
const BILL_KEY: &str = "bill_info";

/// Older answers name the category field after the account type
const LEGACY_CATEGORY_KEY: &str = "account_type";

const NULL_LITERALS: &[&str] = &["null", "none", "unknown", "n/a", "na"];

/// Parse a raw model answer into a record valid under `schema`.
pub fn parse_answer(raw: &str, schema: CategorySchema) -> Result<BillRecord, BillError> {
    let section = answer_section(raw);
    let json_str = extract_json(section).ok_or_else(|| BillError::Parse {
        reason: "answer contains no JSON".to_string(),
        raw: raw.to_string(),
    })?;

    let value: Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(e) => quote_overflowing_numbers(json_str)
            .and_then(|quoted| serde_json::from_str::<Value>(&quoted).ok())
            .ok_or_else(|| BillError::Parse {
                reason: e.to_string(),
                raw: raw.to_string(),
            })?,
    };

    let obj = value
        .as_object()
        .ok_or_else(|| BillError::Validation(format!("expected a JSON object, got {}", kind_of(&value))))?;

    let obj = match obj.get(BILL_KEY) {
        None => obj,
        Some(Value::Object(inner)) => inner,
        Some(Value::Null) => return Ok(BillRecord::default()),
        Some(other) => {
            return Err(BillError::Validation(format!(
                "`{BILL_KEY}` must be an object, got {}",
                kind_of(other)
            )));
        }
    };

    Ok(record_from_object(obj, schema))
}

fn record_from_object(obj: &Map<String, Value>, schema: CategorySchema) -> BillRecord {
    let category_value = obj
        .get("category")
        .filter(|v| !v.is_null())
        .or_else(|| obj.get(LEGACY_CATEGORY_KEY));

    BillRecord {
        merchant: obj.get("merchant").and_then(coerce_merchant),
        amount: obj.get("amount").and_then(coerce_amount),
        category: category_value.and_then(|v| coerce_category(v, schema)),
        date: obj.get("date").and_then(coerce_date),
    }
}

fn number_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<pre>[:\[,]\s*)(?P<num>-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)")
            .expect("invalid number literal regex")
    })
}

/// A number too large for f64 fails the whole JSON parse. Quote such
/// literals so only the field holding one is dropped. `None` when there
/// were none.
fn quote_overflowing_numbers(json: &str) -> Option<String> {
    let mut quoted_any = false;
    let out = number_literal_re().replace_all(json, |caps: &Captures<'_>| {
        let num = &caps["num"];
        if num.parse::<f64>().is_ok_and(f64::is_finite) {
            caps[0].to_string()
        } else {
            quoted_any = true;
            format!("{}\"{num}\"", &caps["pre"])
        }
    });
    quoted_any.then(|| out.into_owned())
}

/// The text after the answer marker, up to the completion marker.
/// Answers without the marker are used whole.
fn answer_section(raw: &str) -> &str {
    let Some(start) = raw.find(ANSWER_MARKER) else {
        return raw;
    };
    let rest = &raw[start + ANSWER_MARKER.len()..];
    match rest.find(COMPLETED_MARKER) {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// Locate the JSON text: fenced block contents, the text itself when it
/// already looks like JSON, else the first balanced `{...}` span.
fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(fenced) = fenced_block(trimmed) {
        return Some(fenced.trim());
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }

    first_object_span(trimmed).or(Some(trimmed))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = strip_language_tag(after);
    let end = after.find("```").unwrap_or(after.len());
    Some(&after[..end])
}

fn strip_language_tag(s: &str) -> &str {
    let tag_len = s.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if s[..tag_len].eq_ignore_ascii_case("json") {
        &s[tag_len..]
    } else {
        s
    }
}

fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn coercion_failed<T>(field: &'static str, value: &Value) -> Option<T> {
    let err = BillError::FieldCoercion {
        field,
        value: value.to_string(),
    };
    warn!("{err}; field dropped");
    None
}

fn coerce_merchant(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || NULL_LITERALS.iter().any(|n| s.eq_ignore_ascii_case(n)) {
                None
            } else {
                Some(s.to_string())
            }
        }
        other => coercion_failed("merchant", other),
    }
}

fn coerce_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n
            .as_f64()
            .and_then(amount_from_number)
            .or_else(|| coercion_failed("amount", value)),
        Value::String(s) if s.trim().is_empty() || is_null_literal(s) => None,
        Value::String(s) => parse_amount(s).or_else(|| coercion_failed("amount", value)),
        other => coercion_failed("amount", other),
    }
}

fn coerce_category(value: &Value, schema: CategorySchema) -> Option<Category> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() || is_null_literal(s) => None,
        Value::String(s) => schema.parse(s).or_else(|| coercion_failed("category", value)),
        other => coercion_failed("category", other),
    }
}

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() || is_null_literal(s) => None,
        Value::String(s) => normalize_date(s).or_else(|| coercion_failed("date", value)),
        other => coercion_failed("date", other),
    }
}

fn is_null_literal(s: &str) -> bool {
    let s = s.trim();
    NULL_LITERALS.iter().any(|n| s.eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<BillRecord, BillError> {
        parse_answer(raw, CategorySchema::Extended)
    }

    #[test]
    fn test_marker_layout() {
        let raw = "[[ ## reasoning ## ]]\nThe email says $1,635.00 went to Testing VILLAGE on Sep 4.\n\n\
[[ ## bill_info ## ]]\n{\"merchant\": \"Testing VILLAGE\", \"amount\": 1635.0, \"category\": null, \"date\": \"2025-09-04\"}\n\n\
[[ ## completed ## ]]";
        let record = parse(raw).unwrap();
        assert_eq!(record.merchant.as_deref(), Some("Testing VILLAGE"));
        assert_eq!(record.amount, Some(1635.0));
        assert_eq!(record.category, None);
        assert_eq!(record.date_string().as_deref(), Some("2025-09-04"));
    }

    #[test]
    fn test_fenced_empty_object_is_empty_record() {
        let record = parse("```json\n{}\n```").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_fence_inside_answer_section() {
        let raw = "[[ ## bill_info ## ]]\n```json\n{\"merchant\": \"ACME\"}\n```\n[[ ## completed ## ]]";
        assert_eq!(parse(raw).unwrap().merchant.as_deref(), Some("ACME"));
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let raw = "Sure! Here is the bill: {\"merchant\": \"Cafe {Brace}\", \"amount\": \"$4.50\"} Hope that helps.";
        let record = parse(raw).unwrap();
        assert_eq!(record.merchant.as_deref(), Some("Cafe {Brace}"));
        assert_eq!(record.amount, Some(4.5));
    }

    #[test]
    fn test_nested_bill_info_and_legacy_field() {
        let raw = r#"{"bill_info": {"merchant": "Shell", "amount": "-$40.12", "account_type": "vehicle/insurance", "date": "Sep 4, 2025 at 4:29 PM ET"}}"#;
        let record = parse(raw).unwrap();
        assert_eq!(record.merchant.as_deref(), Some("Shell"));
        assert_eq!(record.amount, Some(40.12));
        assert_eq!(record.category, Some(Category::Vehicle));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2025, 9, 4));
    }

    #[test]
    fn test_bad_fields_are_nulled_individually() {
        let raw = r#"{"merchant": "ACME", "amount": "twelve dollars", "category": "groceries", "date": "someday"}"#;
        let record = parse(raw).unwrap();
        assert_eq!(record.merchant.as_deref(), Some("ACME"));
        assert_eq!(record.amount, None);
        assert_eq!(record.category, None);
        assert_eq!(record.date, None);
    }

    #[test]
    fn test_out_of_range_amount_only_drops_amount() {
        let raw = r#"{"merchant": "ACME", "amount": 1e400, "category": "dining", "date": "2025-09-04"}"#;
        let record = parse(raw).unwrap();
        assert_eq!(record.merchant.as_deref(), Some("ACME"));
        assert_eq!(record.amount, None);
        assert_eq!(record.category, Some(Category::Dining));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2025, 9, 4));

        let raw = r#"{"bill_info": {"merchant": "ACME", "amount": -12.50, "note": [1e999, 2]}}"#;
        let record = parse(raw).unwrap();
        assert_eq!(record.amount, Some(12.5));
    }

    #[test]
    fn test_null_literals() {
        let raw = r#"{"merchant": "Unknown", "amount": "N/A", "category": "null", "date": ""}"#;
        assert!(parse(raw).unwrap().is_empty());
    }

    #[test]
    fn test_category_outside_scheme_dropped() {
        let raw = r#"{"merchant": "Chase Card", "category": "credit"}"#;
        assert_eq!(parse(raw).unwrap().category, None);
        let legacy = parse_answer(raw, CategorySchema::Legacy).unwrap();
        assert_eq!(legacy.category, Some(Category::Credit));
    }

    #[test]
    fn test_not_json_is_parse_error() {
        let err = parse("I could not find any bill in this email.").unwrap_err();
        assert_eq!(err.kind(), "parse");
        let err = parse("").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_non_object_is_validation_error() {
        let err = parse("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = parse(r#"{"bill_info": "none"}"#).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_null_bill_info() {
        assert!(parse(r#"{"bill_info": null}"#).unwrap().is_empty());
    }
}
