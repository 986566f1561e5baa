//! Link discovery
//!
//! Extracts the hyperlinks of a page that are worth following: same host
//! and port as the page, http(s) only, and not pointing at account pages,
//! APIs or downloadable files.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Path fragments of pages that never carry records
const EXCLUDED_PATH_PARTS: &[&str] = &[
    "/login", "/signin", "/register", "/signup", "/logout", "/admin", "/api/",
];

/// File extensions that are not HTML pages
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".zip", ".rar", ".jpg", ".jpeg", ".png",
    ".gif", ".mp3", ".mp4",
];

const EXCLUDED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "data:"];

/// Extracts followable links from an HTML page
///
/// # Link Rules
///
/// - `<a href>` only; anchors with a `download` attribute are skipped
/// - Resolved against `base_url`, fragment removed
/// - Scheme must be http or https; host and port must equal the base's
/// - Account, admin and API paths and non-HTML file extensions are dropped
///
/// # Returns
///
/// Distinct URLs in document order
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&anchor_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(url) = resolve_link(href, base_url) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should not be followed.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if EXCLUDED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    url.set_fragment(None);

    is_followable(&url, base_url).then_some(url)
}

/// Checks scheme, host/port and exclusion rules for a resolved URL
pub fn is_followable(url: &Url, base_url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    if url.host_str() != base_url.host_str() || url.port() != base_url.port() {
        return false;
    }

    let path = url.path().to_lowercase();
    if EXCLUDED_PATH_PARTS.iter().any(|part| path.contains(part)) {
        return false;
    }

    !EXCLUDED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.edu/dir/page").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        extract_links(html, &base_url())
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let found = links(
            r#"<a href="/about">About</a>
               <a href="staff">Staff</a>
               <a href="https://example.edu/results?year=2024">Results</a>"#,
        );
        assert_eq!(
            found,
            vec![
                "https://example.edu/about",
                "https://example.edu/dir/staff",
                "https://example.edu/results?year=2024",
            ]
        );
    }

    #[test]
    fn test_other_hosts_and_ports_excluded() {
        let found = links(
            r#"<a href="https://other.edu/a">Other</a>
               <a href="https://sub.example.edu/b">Subdomain</a>
               <a href="https://example.edu:8443/c">Port</a>
               <a href="/d">Same</a>"#,
        );
        assert_eq!(found, vec!["https://example.edu/d"]);
    }

    #[test]
    fn test_every_link_shares_host_and_port() {
        let base = Url::parse("http://127.0.0.1:8080/").unwrap();
        let html = r#"<a href="/a"></a><a href="http://127.0.0.1:9090/b"></a>
                      <a href="http://localhost:8080/c"></a><a href="//127.0.0.1:8080/d"></a>"#;
        for link in extract_links(html, &base) {
            assert_eq!(link.host_str(), base.host_str());
            assert_eq!(link.port(), base.port());
        }
    }

    #[test]
    fn test_special_schemes_excluded() {
        let found = links(
            r#"<a href="mailto:office@example.edu">Mail</a>
               <a href="tel:+92211234567">Call</a>
               <a href="javascript:void(0)">JS</a>
               <a href="data:text/html,hi">Data</a>
               <a href="ftp://example.edu/file">FTP</a>"#,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_excluded_paths_and_extensions() {
        let found = links(
            r#"<a href="/login">Login</a>
               <a href="/Admin/users">Admin</a>
               <a href="/api/v1/records">API</a>
               <a href="/prospectus.PDF">PDF</a>
               <a href="/photo.jpeg">Photo</a>
               <a href="/results.asp">Results</a>"#,
        );
        assert_eq!(found, vec!["https://example.edu/results.asp"]);
    }

    #[test]
    fn test_fragments_stripped_and_deduplicated() {
        let found = links(
            r##"<a href="/list#top">One</a>
               <a href="/list#bottom">Two</a>
               <a href="#local">Local</a>
               <a href="/list">Three</a>"##,
        );
        assert_eq!(found, vec!["https://example.edu/list"]);
    }

    #[test]
    fn test_download_links_skipped() {
        let found = links(r#"<a href="/file" download>File</a><a href="/page2">Next</a>"#);
        assert_eq!(found, vec!["https://example.edu/page2"]);
    }

    #[test]
    fn test_no_links() {
        assert!(links("<html><body><p>No links</p></body></html>").is_empty());
    }
}
