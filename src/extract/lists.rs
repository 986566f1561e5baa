//! List heuristic: each list item is a free-text candidate

use crate::extract::normalize::record_from_text;
use crate::extract::{element_text, Heuristic, Record};
use scraper::{ElementRef, Html, Selector};

/// Runs the text of every direct `<li>` child of `<ul>`/`<ol>` through
/// free-text extraction
#[derive(Debug, Default)]
pub struct ListHeuristic;

impl Heuristic for ListHeuristic {
    fn name(&self) -> &'static str {
        "lists"
    }

    fn extract(&self, document: &Html, source_url: &str) -> Vec<Record> {
        let Ok(list_sel) = Selector::parse("ul, ol") else {
            return Vec::new();
        };

        document
            .select(&list_sel)
            .flat_map(|list| list.children().filter_map(ElementRef::wrap))
            .filter(|child| child.value().name() == "li")
            .map(element_text)
            .filter(|text| !text.is_empty())
            .filter_map(|text| record_from_text(&text, source_url))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<Record> {
        ListHeuristic.extract(&Html::parse_document(html), "https://example.edu/staff")
    }

    #[test]
    fn test_list_items() {
        let records = extract(
            r#"<ul>
                <li>Asma Khan 021-34567890</li>
                <li>Bilal Ahmed</li>
                <li>nothing here</li>
            </ul>"#,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name.as_deref(), Some("Asma Khan"));
        assert_eq!(records[0].phone.as_deref(), Some("02134567890"));
        assert_eq!(records[1].name.as_deref(), Some("Bilal Ahmed"));
        assert_eq!(records[1].phone, None);
    }

    #[test]
    fn test_nested_lists() {
        // The outer item includes the nested text; the nested list is read on its own too
        let records = extract(
            r#"<ol>
                <li>Zara Malik <ul><li>Nadia Hussain</li></ul></li>
            </ol>"#,
        );
        let names: Vec<_> = records.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["Zara Malik Nadia Hussain", "Nadia Hussain"]);
    }

    #[test]
    fn test_empty_lists() {
        assert!(extract("<ul></ul><ol><li>  </li></ol>").is_empty());
    }
}
