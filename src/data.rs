use std::{fmt, str::FromStr, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    User(String),
    Card(u64),
    Belongs(bool),
}

impl PropertyValue {
    pub fn as_display(&self) -> String {
        match self {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Number(n) => n.normalize().to_string(),
            PropertyValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            PropertyValue::User(login) => login.clone(),
            PropertyValue::Card(number) => format!("#{number}"),
            PropertyValue::Belongs(b) => if *b { "yes" } else { "no" }.to_string(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

fn card_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#?(\d+)$").expect("card number pattern"))
}

fn card_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#(\d+)(\s.*)?$").expect("card reference pattern"))
}

pub fn is_card_number(value: &str) -> bool {
    card_number_pattern().is_match(value.trim())
}

/// Parses `#42` or `42`. Returns `None` for anything else, including numbers
/// that do not fit in a `u64`.
pub fn parse_card_number(value: &str) -> Option<u64> {
    let captures = card_number_pattern().captures(value.trim())?;
    captures[1].parse().ok()
}

pub fn parse_card_reference(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if let Some(number) = parse_card_number(trimmed) {
        return Some(number);
    }
    let captures = card_reference_pattern().captures(trimmed)?;
    captures[1].parse().ok()
}

pub fn parse_number(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

pub fn is_number(value: &str) -> bool {
    parse_number(value).is_some()
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d %b %Y", "%d %B %Y",
        "%b %d, %Y", "%B %d, %Y", "%d-%b-%Y",
    ];
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

pub fn is_date(value: &str) -> bool {
    parse_naive_date(value).is_some()
}

pub fn parse_belonging(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" => Some(true),
        "no" | "n" | "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

pub fn word_count(value: &str) -> usize {
    value.split_whitespace().count()
}

/// Lowercases and collapses runs of whitespace, so `"Due  Date"` and
/// `"due date"` compare equal.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_numbers_accept_hash_prefix() {
        assert_eq!(parse_card_number("#42"), Some(42));
        assert_eq!(parse_card_number("42"), Some(42));
        assert_eq!(parse_card_number(" 7 "), Some(7));
        assert_eq!(parse_card_number("abc"), None);
        assert_eq!(parse_card_number("#"), None);
        assert_eq!(parse_card_number("4.2"), None);
    }

    #[test]
    fn card_references_allow_trailing_names() {
        assert_eq!(parse_card_reference("#12 Release 1"), Some(12));
        assert_eq!(parse_card_reference("12"), Some(12));
        assert_eq!(parse_card_reference("12 Release"), None);
    }

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06"), Some(expected));
        assert_eq!(parse_naive_date("06/05/2024"), Some(expected));
        assert_eq!(parse_naive_date("2024/05/06"), Some(expected));
        assert_eq!(parse_naive_date("06 May 2024"), Some(expected));
        assert_eq!(parse_naive_date("soon"), None);
    }

    #[test]
    fn numbers_parse_as_decimals() {
        assert_eq!(parse_number("12"), Some(Decimal::from(12)));
        assert_eq!(parse_number("-1.50"), Some(Decimal::new(-150, 2)));
        assert!(parse_number("1e3").is_some());
        assert_eq!(parse_number("twelve"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn normalize_name_collapses_spaces_and_case() {
        assert_eq!(normalize_name("  Due   DATE "), "due date");
    }

    #[test]
    fn display_formats_each_variant() {
        assert_eq!(PropertyValue::Card(5).to_string(), "#5");
        assert_eq!(PropertyValue::Number(Decimal::new(1500, 2)).to_string(), "15");
        assert_eq!(PropertyValue::Belongs(false).to_string(), "no");
    }
}
