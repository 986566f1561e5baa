//! Free-text heuristics over content blocks and small contact snippets

use crate::extract::normalize::record_from_text;
use crate::extract::patterns::{contains_name, contains_phone};
use crate::extract::{element_text, Heuristic, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static CONTENT_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(content|data|list|result)").expect("valid content class regex"));

/// Content blocks must be longer than this many characters
const MIN_BLOCK_CHARS: usize = 20;

/// Contact snippets must be shorter than this many characters
const MAX_SNIPPET_CHARS: usize = 500;

/// Free-text extraction over two kinds of element:
///
/// 1. `div`/`article`/`section` blocks whose class looks like a content
///    container
/// 2. small `div`/`span`/`p`/`td`/`li` elements that mention both a name
///    and a phone number; these only yield records when both resolve
#[derive(Debug, Default)]
pub struct FreeTextHeuristic;

impl FreeTextHeuristic {
    fn content_blocks(&self, document: &Html, source_url: &str) -> Vec<Record> {
        let Ok(block_sel) = Selector::parse("div[class], article[class], section[class]") else {
            return Vec::new();
        };

        document
            .select(&block_sel)
            .filter(|el| el.value().attr("class").is_some_and(|c| CONTENT_CLASS.is_match(c)))
            .map(element_text)
            .filter(|text| text.chars().count() > MIN_BLOCK_CHARS)
            .filter_map(|text| record_from_text(&text, source_url))
            .collect()
    }

    fn contact_snippets(&self, document: &Html, source_url: &str) -> Vec<Record> {
        let Ok(snippet_sel) = Selector::parse("div, span, p, td, li") else {
            return Vec::new();
        };

        document
            .select(&snippet_sel)
            .map(element_text)
            .filter(|text| !text.is_empty() && text.chars().count() < MAX_SNIPPET_CHARS)
            .filter(|text| contains_phone(text) && contains_name(text))
            .filter_map(|text| record_from_text(&text, source_url))
            .filter(|record| record.name.is_some() && record.phone.is_some())
            .collect()
    }
}

impl Heuristic for FreeTextHeuristic {
    fn name(&self) -> &'static str {
        "free-text"
    }

    fn extract(&self, document: &Html, source_url: &str) -> Vec<Record> {
        let mut records = self.content_blocks(document, source_url);
        records.extend(self.contact_snippets(document, source_url));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<Record> {
        FreeTextHeuristic.extract(&Html::parse_document(html), "https://example.edu/about")
    }

    #[test]
    fn test_content_block() {
        let records = extract(
            r#"<div class="main-Content">Principal Sara Iqbal heads Model College Karachi</div>"#,
        );

        assert!(!records.is_empty());
        assert_eq!(records[0].name.as_deref(), Some("Principal Sara Iqbal"));
        assert!(records[0].institution.is_some());
    }

    #[test]
    fn test_short_content_block_ignored() {
        let records = extract(r#"<div class="content">Asma Khan</div>"#);
        assert!(records.is_empty());
    }

    #[test]
    fn test_non_content_class_ignored() {
        let records = extract(r#"<div class="footer">Principal Sara Iqbal heads Model College Karachi</div>"#);
        assert!(records.is_empty());
    }

    #[test]
    fn test_contact_snippet_needs_name_and_phone() {
        let records = extract(
            r#"<p>Asma Khan 021-34567890</p>
               <p>call 021-34567890</p>
               <p>Bilal Ahmed</p>"#,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Asma Khan"));
        assert_eq!(records[0].phone.as_deref(), Some("02134567890"));
    }

    #[test]
    fn test_generic_number_does_not_resolve_in_snippet() {
        // The structured pattern sees a number, but free text only accepts
        // Pakistani formats, so no phone resolves
        let records = extract("<span>Asma Khan 1234567890</span>");
        assert!(records.is_empty());
    }

    #[test]
    fn test_script_text_ignored() {
        let records = extract("<p><script>var x = 'Asma Khan 021-34567890';</script></p>");
        assert!(records.is_empty());
    }
}
