//! Record extraction from HTML
//!
//! Extraction runs a set of independent [`Heuristic`]s over one parsed
//! document and returns the union of their candidates. Every returned
//! record carries at least one standard field.
//!
//! # Components
//!
//! - `TableHeuristic`: header row plus positional data rows
//! - `ListHeuristic`: direct `<li>` children of lists as free text
//! - `FreeTextHeuristic`: content containers and small contact snippets
//! - `normalize`: synonym mapping of raw keys onto [`Field`]s
//! - `patterns`: phone, name, institution and address patterns

mod lists;
pub mod normalize;
pub mod patterns;
mod record;
mod tables;
mod text;

pub use lists::ListHeuristic;
pub use record::{Field, Record};
pub use tables::TableHeuristic;
pub use text::FreeTextHeuristic;

use scraper::{ElementRef, Html};

/// One independent way of finding records in a page
pub trait Heuristic: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Extracts candidate records from a parsed document
    fn extract(&self, document: &Html, source_url: &str) -> Vec<Record>;
}

/// Runs every configured heuristic over a page
pub struct RecordExtractor {
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordExtractor {
    /// Creates an extractor with the table, list and free-text heuristics
    pub fn new() -> Self {
        Self::with_heuristics(vec![
            Box::new(TableHeuristic),
            Box::new(ListHeuristic),
            Box::new(FreeTextHeuristic),
        ])
    }

    pub fn with_heuristics(heuristics: Vec<Box<dyn Heuristic>>) -> Self {
        Self { heuristics }
    }

    /// Extracts candidate records from `html`
    ///
    /// # Arguments
    ///
    /// * `html` - Raw page HTML
    /// * `source_url` - URL the page was fetched from, stamped on each record
    ///
    /// # Returns
    ///
    /// Records from all heuristics, in heuristic order. Empty when nothing
    /// matched.
    pub fn extract(&self, html: &str, source_url: &str) -> Vec<Record> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for heuristic in &self.heuristics {
            let found: Vec<Record> = heuristic
                .extract(&document, source_url)
                .into_iter()
                .filter(Record::has_standard_field)
                .collect();
            tracing::trace!(
                "{} heuristic found {} records on {}",
                heuristic.name(),
                found.len(),
                source_url
            );
            records.extend(found);
        }

        records
    }
}

/// Visible text of an element
///
/// Text nodes are trimmed and joined with single spaces; `<script>`,
/// `<style>` and `<noscript>` content is skipped.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    parts.join(" ")
}

fn collect_text(element: ElementRef<'_>, parts: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !matches!(child_element.value().name(), "script" | "style" | "noscript") {
                collect_text(child_element, parts);
            }
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
}
