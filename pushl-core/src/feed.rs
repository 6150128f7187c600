//! Feed parsing: Atom/RSS via `feed-rs`, plus HTML documents carrying
//! h-entry microformats, which are valid feeds in their own right
//! (spec §6).

use std::collections::BTreeSet;

use scraper::Html;

use crate::error::CoreError;
use crate::html;

/// Everything the feed processor (C4) needs out of a parsed feed,
/// transient for the lifetime of the owning task (spec §3
/// "FeedSnapshot").
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub hub_urls: BTreeSet<String>,
    pub self_url: Option<String>,
    pub item_urls: BTreeSet<String>,
    pub archive_urls: BTreeSet<String>,
}

/// Parses `body` as Atom/RSS/RDF. Falls back to treating it as an
/// h-entry-bearing HTML document when the content type says HTML
/// rather than a feed format.
pub fn parse(body: &[u8], content_type: Option<&str>, base_url: &str) -> Result<FeedSnapshot, CoreError> {
    let looks_like_html = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("html"))
        .unwrap_or(false);

    if looks_like_html {
        return Ok(parse_html_as_feed(body, base_url));
    }

    let feed = feed_rs::parser::parse(body).map_err(|e| CoreError::FeedParse(e.to_string()))?;

    let mut snapshot = FeedSnapshot::default();
    for link in &feed.links {
        match link.rel.as_deref() {
            Some("hub") => {
                snapshot.hub_urls.insert(link.href.clone());
            }
            Some("self") => {
                snapshot.self_url = Some(link.href.clone());
            }
            Some("prev-archive") => {
                snapshot.archive_urls.insert(link.href.clone());
            }
            _ => {}
        }
    }
    for entry in &feed.entries {
        if let Some(link) = entry.links.first() {
            snapshot.item_urls.insert(link.href.clone());
        }
    }
    Ok(snapshot)
}

fn parse_html_as_feed(body: &[u8], base_url: &str) -> FeedSnapshot {
    let Ok(base) = url::Url::parse(base_url) else {
        return FeedSnapshot::default();
    };
    let text = String::from_utf8_lossy(body);
    let doc = Html::parse_document(&text);
    FeedSnapshot {
        item_urls: html::h_entry_item_urls(&doc, &base),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example</title>
  <id>https://a.example/feed.xml</id>
  <link rel="hub" href="https://hub.example/"/>
  <link rel="self" href="https://a.example/feed.xml"/>
  <entry>
    <title>Post 1</title>
    <id>https://a.example/post1</id>
    <link href="https://a.example/post1"/>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn extracts_hub_self_and_items() {
        let snapshot = parse(ATOM.as_bytes(), Some("application/atom+xml"), "https://a.example/feed.xml").unwrap();
        assert!(snapshot.hub_urls.contains("https://hub.example/"));
        assert_eq!(snapshot.self_url.as_deref(), Some("https://a.example/feed.xml"));
        assert!(snapshot.item_urls.contains("https://a.example/post1"));
    }

    #[test]
    fn html_with_h_entries_is_a_feed() {
        let html = r#"<html><body>
            <div class="h-entry"><a class="u-url" href="https://a.example/post1">1</a></div>
            <div class="h-entry"><span>no u-url</span></div>
        </body></html>"#;
        let snapshot = parse(html.as_bytes(), Some("text/html"), "https://a.example/notes").unwrap();
        assert_eq!(snapshot.item_urls.len(), 1);
        assert!(snapshot.item_urls.contains("https://a.example/post1"));
    }

    #[test]
    fn garbage_is_a_parse_error_not_a_panic() {
        let result = parse(b"not a feed", Some("application/atom+xml"), "https://a.example/feed.xml");
        assert!(result.is_err());
    }
}
