//! Deterministic merchant → category rules.
//!
//! Rules are ordered `(pattern, category)` pairs matched as case-insensitive
//! substrings of the merchant name; the first matching rule wins. The same
//! rules are rendered into the extraction instructions so the model and the
//! resolver never disagree about what a pattern means.
//!
//! Mapping files are CSV with a `pattern,category` header:
//!
//! ```text
//! pattern,category
//! VILLAGE,dining
//! BARCLAY VILLAGE,shopping
//! ```

use anyhow::Context;
use billmail_core::{Category, CategorySchema};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// One substring rule
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: Category,
}

/// Ordered merchant-substring rules. Loaded once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMapping {
    rules: Vec<CategoryRule>,
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    pattern: String,
    category: String,
}

impl CategoryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs in declaration order. Duplicate patterns keep the first.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Category)>,
        S: Into<String>,
    {
        let mut mapping = Self::new();
        for (pattern, category) in pairs {
            mapping.push(pattern, category);
        }
        mapping
    }

    /// Append a rule; blank or already-declared patterns are ignored.
    /// Returns whether the rule was added.
    pub fn push(&mut self, pattern: impl Into<String>, category: Category) -> bool {
        let pattern = pattern.into().trim().to_string();
        if pattern.is_empty() {
            return false;
        }
        let key = pattern.to_lowercase();
        if self.rules.iter().any(|r| r.pattern.to_lowercase() == key) {
            return false;
        }
        self.rules.push(CategoryRule { pattern, category });
        true
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parse CSV rules. Malformed rows, rows with a blank pattern and rows
    /// with a label outside `schema` are skipped with a warning.
    pub fn from_csv_reader<R: Read>(reader: R, schema: CategorySchema) -> Self {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut mapping = Self::new();
        for (idx, row) in rdr.deserialize::<MappingRow>().enumerate() {
            // header is line 1
            let line = idx + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(line, "skipping malformed mapping row: {e}");
                    continue;
                }
            };
            if row.pattern.is_empty() {
                warn!(line, "skipping mapping row with empty pattern");
                continue;
            }
            let Some(category) = schema.parse(&row.category) else {
                warn!(
                    line,
                    pattern = %row.pattern,
                    category = %row.category,
                    schema = schema.name(),
                    "skipping mapping row: category not in active scheme"
                );
                continue;
            };
            if !mapping.push(row.pattern.as_str(), category) {
                debug!(line, pattern = %row.pattern, "duplicate mapping pattern ignored");
            }
        }
        mapping
    }

    /// Render the rules as extraction guidance, one line per rule.
    pub fn guidance(&self) -> String {
        self.rules
            .iter()
            .map(|r| format!("If merchant contains \"{}\", category is {}", r.pattern, r.category))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Load a mapping file. A missing or unreadable file degrades to an empty
/// mapping with a warning; extraction still runs on model categories alone.
pub fn load_mapping(path: impl AsRef<Path>, schema: CategorySchema) -> CategoryMapping {
    let path = path.as_ref();
    let loaded = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))
        .map(|file| CategoryMapping::from_csv_reader(file, schema));

    match loaded {
        Ok(mapping) => {
            debug!(path = %path.display(), rules = mapping.len(), "loaded category mapping");
            mapping
        }
        Err(e) => {
            warn!(path = %path.display(), "category mapping unavailable, using none: {e:#}");
            CategoryMapping::new()
        }
    }
}

/// First rule whose pattern occurs in `merchant`, ignoring case.
pub fn resolve(merchant: Option<&str>, mapping: &CategoryMapping) -> Option<Category> {
    let merchant = merchant?.trim();
    if merchant.is_empty() {
        return None;
    }
    let haystack = merchant.to_lowercase();
    mapping
        .rules
        .iter()
        .find(|r| haystack.contains(&r.pattern.to_lowercase()))
        .map(|r| r.category)
}
