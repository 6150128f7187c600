//! Shared HTML tree-walking helpers used by both the feed processor
//! (h-entry-as-feed, spec §6) and the entry processor (spec §4.5).

use std::collections::BTreeSet;

use scraper::{ElementRef, Html, Selector};

/// `rel` tokens that mark a link as navigational rather than a mention
/// target (spec §4.5 step 3).
const REL_BLACKLIST: &[&str] = &["author", "self", "nofollow", "nonotify"];

fn rel_is_blacklisted(rel: &str) -> bool {
    rel.split_whitespace()
        .any(|token| REL_BLACKLIST.contains(&token) || token.contains("nav"))
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

/// Locates the top-level entry container by priority: `h-entry` class,
/// then `<article>`, then `entry` class, falling back to the whole
/// document (spec §4.5 step 1).
pub fn find_entry_container(doc: &Html) -> ElementRef<'_> {
    for css in [".h-entry", "article", ".entry"] {
        if let Some(el) = doc.select(&selector(css)).next() {
            return el;
        }
    }
    doc.root_element()
}

/// The document's `<link rel="canonical">` href, if any (spec §4.5
/// step 2). Matches on a whitespace-tokenized `rel` attribute rather
/// than exact string equality, since `rel` is a space-separated token
/// list per the HTML spec.
pub fn canonical_link(doc: &Html) -> Option<String> {
    doc.select(&selector("link[rel]")).find_map(|el| {
        let rel = el.value().attr("rel")?;
        if rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("canonical")) {
            el.value().attr("href").map(str::to_string)
        } else {
            None
        }
    })
}

/// Every `href` within `container`, excluding links whose `rel` set
/// intersects the non-mention blacklist, resolved against `base`
/// (spec §4.5 step 3).
pub fn collect_links(container: ElementRef<'_>, base: &url::Url) -> BTreeSet<String> {
    let href_selector = selector("[href]");
    container
        .select(&href_selector)
        .filter_map(|el| {
            let value = el.value();
            if let Some(rel) = value.attr("rel") {
                if rel_is_blacklisted(rel) {
                    return None;
                }
            }
            let href = value.attr("href")?;
            base.join(href).ok().map(|u| u.to_string())
        })
        .collect()
}

/// `<link rel="alternate" type="...feed...">` hrefs at the document
/// level, resolved against `base` (spec §4.4/§4.5 recurse-mode feed
/// autodiscovery).
pub fn alternate_feed_links(doc: &Html, base: &url::Url) -> BTreeSet<String> {
    const FEED_TYPES: &[&str] = &[
        "application/atom+xml",
        "application/rss+xml",
        "application/xml",
        "text/xml",
    ];
    doc.select(&selector("link[rel]"))
        .filter_map(|el| {
            let value = el.value();
            let rel = value.attr("rel")?;
            if !rel.split_whitespace().any(|t| t.eq_ignore_ascii_case("alternate")) {
                return None;
            }
            let ty = value.attr("type")?;
            if !FEED_TYPES.iter().any(|f| f.eq_ignore_ascii_case(ty)) {
                return None;
            }
            let href = value.attr("href")?;
            base.join(href).ok().map(|u| u.to_string())
        })
        .collect()
}

/// Every `h-entry` element that carries a `u-url`, resolved against
/// `base` — HTML documents with h-entry microformats are valid feeds,
/// one item per `u-url`-bearing entry (spec §6).
pub fn h_entry_item_urls(doc: &Html, base: &url::Url) -> BTreeSet<String> {
    let entry_selector = selector(".h-entry");
    let u_url_selector = selector(".u-url[href]");
    doc.select(&entry_selector)
        .filter_map(|entry| {
            entry
                .select(&u_url_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| base.join(href).ok())
                .map(|u| u.to_string())
        })
        .collect()
}

/// The `href` of the first `tag` element whose `rel` attribute tokens
/// include `rel`, if any. An element with a matching `rel` but no
/// `href` attribute is skipped rather than treated as an empty-string
/// endpoint (spec §4.6: only an explicitly-empty `href` means "the
/// target itself").
pub fn find_rel_attr(doc: &Html, tag: &str, rel: &str) -> Option<String> {
    doc.select(&selector(tag)).find_map(|el| {
        let value = el.value();
        let tokens = value.attr("rel")?;
        if tokens.split_whitespace().any(|t| t.eq_ignore_ascii_case(rel)) {
            value.attr("href").map(str::to_string)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> url::Url {
        url::Url::parse("https://a.example/post1").unwrap()
    }

    #[test]
    fn finds_h_entry_before_article() {
        let doc = Html::parse_document(
            r#"<html><body><article>ignored</article><div class="h-entry">kept</div></body></html>"#,
        );
        let container = find_entry_container(&doc);
        assert!(container.html().contains("kept"));
    }

    #[test]
    fn falls_back_to_whole_document() {
        let doc = Html::parse_document(r#"<html><body><p>plain</p></body></html>"#);
        let container = find_entry_container(&doc);
        assert!(container.html().contains("plain"));
    }

    #[test]
    fn canonical_link_is_found() {
        let doc = Html::parse_document(
            r#"<html><head><link rel="canonical" href="https://canonical.example/post"></head></html>"#,
        );
        assert_eq!(
            canonical_link(&doc),
            Some("https://canonical.example/post".to_string())
        );
    }

    #[test]
    fn collect_links_skips_blacklisted_rels() {
        let doc = Html::parse_document(
            r#"<html><body><div class="h-entry">
                <a href="https://b.example/page">kept</a>
                <a href="https://c.example/author" rel="author">author</a>
                <a href="/nav/menu" rel="nav-primary">nav</a>
            </div></body></html>"#,
        );
        let container = find_entry_container(&doc);
        let links = collect_links(container, &base());
        assert_eq!(links.len(), 1);
        assert!(links.contains("https://b.example/page"));
    }

    #[test]
    fn finds_webmention_link_element() {
        let doc = Html::parse_document(
            r#"<html><head><link rel="webmention" href="https://b.example/wm"></head></html>"#,
        );
        assert_eq!(
            find_rel_attr(&doc, "link", "webmention"),
            Some("https://b.example/wm".to_string())
        );
    }

    #[test]
    fn finds_h_entry_item_urls() {
        let doc = Html::parse_document(
            r#"<html><body>
                <div class="h-entry"><a class="u-url" href="https://a.example/post1">1</a></div>
                <div class="h-entry"><span>no url, ignored</span></div>
            </body></html>"#,
        );
        let urls = h_entry_item_urls(&doc, &base());
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("https://a.example/post1"));
    }
}
