//! HTML entry parsing: container selection, canonical-source
//! resolution, and outgoing-link extraction (spec §4.5).

use std::collections::BTreeSet;

use scraper::Html;

use crate::error::CoreError;
use crate::html;

/// Everything the entry processor (C5) derives from one HTML page
/// (spec §3 "EntrySnapshot").
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    /// The mention `source`: the document's declared HTML canonical URL
    /// if present, else the HTTP-header canonical URL if present, else
    /// the fetched URL (spec §4.2 step 4, §4.5 step 2).
    pub source: String,
    /// Outgoing links collected from the entry container, resolved
    /// against `source` (spec §4.5 step 3).
    pub links: BTreeSet<String>,
    /// `<link rel="alternate">` feed URLs at the document level, used
    /// only when recurse mode is enabled (spec §4.5 step 6).
    pub feed_links: BTreeSet<String>,
}

/// Parses an entry page into an `EntrySnapshot`. `header_canonical_url` is
/// the HTTP-level `Link; rel="canonical"` seen at the final redirect hop,
/// if any (spec §4.2 step 4); it is honored as the mention source when the
/// page carries no HTML-level `<link rel="canonical">`, so a canonical
/// declared only via the HTTP header isn't silently ignored.
pub fn parse(
    body: &[u8],
    final_url: &str,
    header_canonical_url: Option<&str>,
) -> Result<EntrySnapshot, CoreError> {
    let base = url::Url::parse(final_url).map_err(|_| CoreError::InvalidUrl(final_url.to_string()))?;
    let text = String::from_utf8_lossy(body);
    let doc = Html::parse_document(&text);

    let source = html::canonical_link(&doc)
        .or_else(|| header_canonical_url.map(str::to_string))
        .unwrap_or_else(|| final_url.to_string());
    let source_url = url::Url::parse(&source).unwrap_or_else(|_| base.clone());

    let container = html::find_entry_container(&doc);
    let links = html::collect_links(container, &source_url);
    let feed_links = html::alternate_feed_links(&doc, &base);

    Ok(EntrySnapshot {
        source,
        links,
        feed_links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_canonical_as_source_when_present() {
        let body = r#"<html><head>
            <link rel="canonical" href="https://canonical.example/post">
        </head><body class="h-entry">
            <a href="https://b.example/page">link</a>
        </body></html>"#;
        let snapshot = parse(body.as_bytes(), "https://x.example/post", None).unwrap();
        assert_eq!(snapshot.source, "https://canonical.example/post");
        assert!(snapshot.links.contains("https://b.example/page"));
    }

    #[test]
    fn falls_back_to_final_url_without_canonical() {
        let body = r#"<html><body class="entry"><a href="/rel/page">link</a></body></html>"#;
        let snapshot = parse(body.as_bytes(), "https://x.example/post", None).unwrap();
        assert_eq!(snapshot.source, "https://x.example/post");
        assert!(snapshot.links.contains("https://x.example/rel/page"));
    }

    #[test]
    fn uses_header_canonical_when_no_html_canonical_present() {
        let body = r#"<html><body class="h-entry"><a href="https://b.example/page">link</a></body></html>"#;
        let snapshot = parse(
            body.as_bytes(),
            "https://x.example/post",
            Some("https://canonical.example/post"),
        )
        .unwrap();
        assert_eq!(snapshot.source, "https://canonical.example/post");
    }

    #[test]
    fn html_canonical_takes_priority_over_header_canonical() {
        let body = r#"<html><head>
            <link rel="canonical" href="https://html-canonical.example/post">
        </head><body class="h-entry"></body></html>"#;
        let snapshot = parse(
            body.as_bytes(),
            "https://x.example/post",
            Some("https://header-canonical.example/post"),
        )
        .unwrap();
        assert_eq!(snapshot.source, "https://html-canonical.example/post");
    }

    #[test]
    fn collects_alternate_feed_links() {
        let body = r#"<html><head>
            <link rel="alternate" type="application/atom+xml" href="https://a.example/cat/feed.xml">
        </head><body class="h-entry"></body></html>"#;
        let snapshot = parse(body.as_bytes(), "https://a.example/post1", None).unwrap();
        assert!(snapshot.feed_links.contains("https://a.example/cat/feed.xml"));
    }
}
