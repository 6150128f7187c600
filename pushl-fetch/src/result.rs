use std::collections::BTreeSet;

/// Outcome of a single logical `fetch(url)` call: the redirect chase,
/// conditional-GET negotiation, and cache bookkeeping are already done
/// by the time a caller sees this.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Post-redirect, post-canonical-header URL.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// True when the response was a 304 and `body` was synthesized from
    /// the prior cache record rather than freshly downloaded.
    pub served_from_cache: bool,
    /// Outbound links recorded on the previous successful fetch of this
    /// URL, carried forward so callers can diff against newly-parsed
    /// links (spec §3, `CacheRecord.links`).
    pub previous_links: BTreeSet<String>,
    /// Canonical URL advertised via an HTTP `Link; rel="canonical"`
    /// header at the final hop, if any. HTML-level `<link
    /// rel="canonical">` is resolved by the caller (the entry
    /// processor), which takes priority over this when both exist.
    pub canonical_url: Option<String>,
    /// The raw `Link` response header from the final hop, if present.
    /// Exposed verbatim (rather than pre-parsed into every rel a caller
    /// might want) so callers can search it for endpoint relations this
    /// crate has no opinion on, e.g. `rel="webmention"`.
    pub link_header: Option<String>,
}

impl FetchResult {
    /// Content types the caller can meaningfully parse as a feed or
    /// HTML entry. Other types (images, PDFs, etc.) short-circuit
    /// parsing per spec §4.2 step 6.
    pub fn is_parseable(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("html")
                    || ct.contains("xml")
                    || ct.contains("json")
                    || ct.contains("rss")
                    || ct.contains("atom")
            }
            None => false,
        }
    }
}
