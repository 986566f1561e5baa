//! Regular expressions used to pull fields out of text

use once_cell::sync::Lazy;
use regex::Regex;

/// Phone number in structured cells: Pakistani formats or a generic
/// 10-13 digit number
static PHONE_STRUCTURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?92[\s-]?[0-9]{2}[\s-]?[0-9]{7,9}|0[0-9]{2}[\s-]?[0-9]{7,9}|\+?[0-9]{10,13})")
        .expect("valid structured phone regex")
});

/// Phone number in free text: Pakistani formats only
static PHONE_FREE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?92[\s-]?[0-9]{2}[\s-]?[0-9]{7,9}|0[0-9]{2}[\s-]?[0-9]{7,9})")
        .expect("valid free text phone regex")
});

/// Two to four consecutive capitalized words
static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})\b").expect("valid name regex")
});

const INSTITUTION_KEYWORDS: [&str; 5] = ["school", "college", "university", "academy", "institute"];

/// One pattern per keyword, tried in keyword order
static INSTITUTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    INSTITUTION_KEYWORDS
        .iter()
        .map(|keyword| {
            Regex::new(&format!(r"(?i)\b([A-Z][a-zA-Z\s]+{}[a-zA-Z\s]*)\b", keyword))
                .expect("valid institution regex")
        })
        .collect()
});

static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][a-zA-Z\s]+(?:Street|Road|Avenue|Lane|Area|Block|Sector|City)[a-zA-Z\s]*)")
        .expect("valid address regex")
});

/// Which phone pattern to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneStyle {
    /// Table cells and other labelled values
    Structured,
    /// Running text, where long digit runs are too ambiguous
    FreeText,
}

/// Removes spaces and hyphens from a phone number
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Finds the first phone number in `text`, normalized
pub fn find_phone(text: &str, style: PhoneStyle) -> Option<String> {
    let pattern = match style {
        PhoneStyle::Structured => &*PHONE_STRUCTURED,
        PhoneStyle::FreeText => &*PHONE_FREE_TEXT,
    };
    pattern
        .find(text)
        .map(|m| normalize_phone(m.as_str()))
        .filter(|phone| !phone.is_empty())
}

/// True if `text` contains something that looks like a phone number
pub fn contains_phone(text: &str) -> bool {
    PHONE_STRUCTURED.is_match(text)
}

/// Finds the first run of two to four capitalized words
pub fn find_name(text: &str) -> Option<String> {
    NAME.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn contains_name(text: &str) -> bool {
    NAME.is_match(text)
}

pub fn find_institution(text: &str) -> Option<String> {
    INSTITUTIONS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

pub fn find_address(text: &str) -> Option<String> {
    ADDRESS
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
