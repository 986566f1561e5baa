//! Table heuristic: header row plus positional data rows

use crate::extract::normalize::normalize_fields;
use crate::extract::{element_text, Heuristic, Record};
use scraper::{Html, Selector};

/// Reads every `<table>` as records
///
/// The first row supplies the keys (lower-cased, spaces replaced with
/// underscores); each later row maps its cells onto them by position.
#[derive(Debug, Default)]
pub struct TableHeuristic;

impl Heuristic for TableHeuristic {
    fn name(&self) -> &'static str {
        "tables"
    }

    fn extract(&self, document: &Html, source_url: &str) -> Vec<Record> {
        let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
            Selector::parse("table"),
            Selector::parse("tr"),
            Selector::parse("th, td"),
        ) else {
            return Vec::new();
        };

        let mut records = Vec::new();

        for table in document.select(&table_sel) {
            let mut rows = table.select(&row_sel);
            let Some(header_row) = rows.next() else {
                continue;
            };

            let headers: Vec<String> = header_row
                .select(&cell_sel)
                .map(|cell| header_key(&element_text(cell)))
                .collect();

            for row in rows {
                let raw: Vec<(String, String)> = row
                    .select(&cell_sel)
                    .map(element_text)
                    .zip(headers.iter())
                    .filter(|(_, header)| !header.is_empty())
                    .map(|(cell, header)| (header.clone(), cell))
                    .collect();

                if raw.is_empty() {
                    continue;
                }
                if let Some(record) = normalize_fields(&raw, source_url) {
                    records.push(record);
                }
            }
        }

        records
    }
}

fn header_key(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<Record> {
        TableHeuristic.extract(&Html::parse_document(html), "https://example.edu/list")
    }

    #[test]
    fn test_header_key() {
        assert_eq!(header_key(" Student Name "), "student_name");
        assert_eq!(header_key("Phone"), "phone");
    }

    #[test]
    fn test_simple_table() {
        let records = extract(
            r#"<table>
                <tr><th>Name</th><th>Phone</th></tr>
                <tr><td>Asma Khan</td><td>0300-1234567</td></tr>
            </table>"#,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Asma Khan"));
        assert_eq!(records[0].phone.as_deref(), Some("03001234567"));
        assert_eq!(records[0].source_url, "https://example.edu/list");
    }

    #[test]
    fn test_extra_cells_and_empty_headers_dropped() {
        let records = extract(
            r#"<table>
                <tr><td>Student Name</td><td></td></tr>
                <tr><td>Bilal Ahmed</td><td>ignored</td><td>also ignored</td></tr>
            </table>"#,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Bilal Ahmed"));
        assert!(records[0].metadata.is_empty());
    }

    #[test]
    fn test_rows_without_standard_fields_skipped() {
        let records = extract(
            r#"<table>
                <tr><th>Roll No</th><th>Grade</th></tr>
                <tr><td>17</td><td>A</td></tr>
            </table>"#,
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_header_only_table() {
        let records = extract("<table><tr><th>Name</th></tr></table>");
        assert!(records.is_empty());
    }

    #[test]
    fn test_multiple_tables() {
        let records = extract(
            r#"<table><tr><th>Name</th></tr><tr><td>Asma Khan</td></tr></table>
               <table><tr><th>Company</th></tr><tr><td>Acme Traders</td></tr></table>"#,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].organization.as_deref(), Some("Acme Traders"));
    }
}
