//! Bill record types: the structured output of one email's extraction

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bill extracted from a bank notification. Every field is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BillRecord {
    /// Payee/recipient name
    pub merchant: Option<String>,
    /// Non-negative monetary value
    pub amount: Option<f64>,
    /// Label from the active category scheme
    pub category: Option<Category>,
    /// Transaction date (YYYY-MM-DD)
    pub date: Option<NaiveDate>,
}

impl BillRecord {
    /// An all-empty record carries no bill and must not reach storage.
    pub fn is_empty(&self) -> bool {
        self.merchant.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.date.is_none()
    }

    /// Date rendered as YYYY-MM-DD
    pub fn date_string(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }
}

impl fmt::Display for BillRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merchant={} amount={} category={} date={}",
            self.merchant.as_deref().unwrap_or("-"),
            self.amount
                .map(|a| format!("{a:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            self.category.map(|c| c.label()).unwrap_or("-"),
            self.date_string().unwrap_or_else(|| "-".to_string()),
        )
    }
}

/// Every category label known to either scheme
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "checking")]
    Checking,
    #[serde(rename = "credit")]
    Credit,
    #[serde(rename = "dining")]
    Dining,
    #[serde(rename = "shopping")]
    Shopping,
    #[serde(rename = "utilities")]
    Utilities,
    #[serde(rename = "rent")]
    Rent,
    #[serde(rename = "vehicle")]
    Vehicle,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    /// Canonical label, as stored and as shown to the model
    pub fn label(&self) -> &'static str {
        match self {
            Category::Checking => "checking",
            Category::Credit => "credit",
            Category::Dining => "dining",
            Category::Shopping => "shopping",
            Category::Utilities => "utilities",
            Category::Rent => "rent",
            Category::Vehicle => "vehicle",
            Category::Other => "other",
        }
    }

    /// One-line meaning used in the extraction instructions
    pub fn description(&self) -> &'static str {
        match self {
            Category::Checking => "paid from a checking/debit account (transfers, Zelle, bill pay)",
            Category::Credit => "charged to a credit card",
            Category::Dining => "restaurants, cafes, bars, food delivery",
            Category::Shopping => "retail, online shopping, entertainment, subscriptions",
            Category::Utilities => "electricity, gas, water, internet, phone",
            Category::Rent => "rent, lease, housing payments",
            Category::Vehicle => "fuel, parking, car payments, auto or other insurance",
            Category::Other => "anything that fits no other category",
        }
    }

    /// Parse a label or a known alias, ignoring case and surrounding whitespace.
    pub fn from_label(raw: &str) -> Option<Category> {
        let s = raw.trim().to_lowercase();
        let cat = match s.as_str() {
            "checking" | "checking account" | "debit" | "支票账户" => Category::Checking,
            "credit" | "credit card" | "信用卡" => Category::Credit,
            "dining" | "food" | "restaurant" | "restaurants" | "餐饮" => Category::Dining,
            "shopping" | "shopping/entertainment" | "shopping & entertainment"
            | "entertainment" => Category::Shopping,
            "utilities" | "utility" => Category::Utilities,
            "rent" | "housing" => Category::Rent,
            "vehicle" | "vehicle/insurance" | "vehicle & insurance" | "insurance" | "auto" => {
                Category::Vehicle
            }
            "other" | "misc" | "miscellaneous" => Category::Other,
            _ => return None,
        };
        Some(cat)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The categorical scheme active for a deployment. Exactly one is used per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CategorySchema {
    /// Account-type tags: checking, credit, dining
    #[serde(rename = "legacy")]
    Legacy,
    /// Bill categories: dining, shopping, utilities, rent, vehicle, other
    #[serde(rename = "extended")]
    #[default]
    Extended,
}

impl CategorySchema {
    /// Labels legal under this scheme, in display order
    pub fn categories(&self) -> &'static [Category] {
        match self {
            CategorySchema::Legacy => &[Category::Checking, Category::Credit, Category::Dining],
            CategorySchema::Extended => &[
                Category::Dining,
                Category::Shopping,
                Category::Utilities,
                Category::Rent,
                Category::Vehicle,
                Category::Other,
            ],
        }
    }

    pub fn accepts(&self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    /// Parse a label, rejecting categories that belong to the other scheme.
    pub fn parse(&self, raw: &str) -> Option<Category> {
        Category::from_label(raw).filter(|c| self.accepts(*c))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CategorySchema::Legacy => "legacy",
            CategorySchema::Extended => "extended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record() {
        let record = BillRecord::default();
        assert!(record.is_empty());
    }

    #[test]
    fn test_partial_record_is_not_empty() {
        let record = BillRecord {
            amount: Some(12.5),
            ..Default::default()
        };
        assert!(!record.is_empty());
    }

    #[test]
    fn test_record_serializes_iso_date_and_label() {
        let record = BillRecord {
            merchant: Some("Testing VILLAGE".to_string()),
            amount: Some(1635.0),
            category: Some(Category::Rent),
            date: NaiveDate::from_ymd_opt(2025, 9, 4),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2025-09-04");
        assert_eq!(json["category"], "rent");
        assert_eq!(json["amount"], 1635.0);
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!(Category::from_label("Shopping/Entertainment"), Some(Category::Shopping));
        assert_eq!(Category::from_label(" Vehicle/Insurance "), Some(Category::Vehicle));
        assert_eq!(Category::from_label("信用卡"), Some(Category::Credit));
        assert_eq!(Category::from_label("groceries?"), None);
    }

    #[test]
    fn test_schemes_are_not_mixed() {
        assert_eq!(CategorySchema::Extended.parse("credit"), None);
        assert_eq!(CategorySchema::Legacy.parse("credit"), Some(Category::Credit));
        assert_eq!(CategorySchema::Legacy.parse("utilities"), None);
        // dining exists in both
        assert!(CategorySchema::Legacy.accepts(Category::Dining));
        assert!(CategorySchema::Extended.accepts(Category::Dining));
    }

    #[test]
    fn test_display() {
        let record = BillRecord {
            merchant: Some("ACME".to_string()),
            amount: Some(3.0),
            ..Default::default()
        };
        assert_eq!(record.to_string(), "merchant=ACME amount=3.00 category=- date=-");
    }
}
