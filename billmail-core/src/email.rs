//! Email inputs to the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// An unread message as delivered by the mail source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEmail {
    /// Empty ids are filled in by the mail source
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
}

/// Email body with quoting, signatures and boilerplate removed.
///
/// Only produced by the normalizer; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBody(String);

impl NormalizedBody {
    /// Wrap text that has already been through normalization.
    pub fn from_normalized(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First `max_chars` characters, for log lines
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.0, max_chars)
    }
}

impl fmt::Display for NormalizedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Truncate on a char boundary, marking the cut with an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
