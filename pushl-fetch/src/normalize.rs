use url::Url;

use crate::error::{FetchError, Result};

/// Normalize a URL per spec §3: lowercase scheme/host, strip default
/// ports, canonicalize path percent-encoding, drop the fragment (the
/// caller retains the original separately for fragment-targeted
/// mentions), preserve query order.
///
/// `normalize(normalize(u)) == normalize(u)` for any `u` this function
/// accepts.
pub fn normalize(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;

    url.set_fragment(None);

    let scheme_default_port = match url.scheme() {
        "http" => Some(80u16),
        "https" => Some(443u16),
        _ => None,
    };
    if url.port() == scheme_default_port {
        let _ = url.set_port(None);
    }

    // `Url` already lowercases scheme and host, and percent-encodes the
    // path consistently, so re-parsing the cleaned URL is sufficient to
    // reach a canonical form.
    Ok(url.to_string())
}

/// Host used as the key for per-host concurrency limiting and
/// persisted alongside cache records for diagnostics.
pub fn host_of(normalized_url: &str) -> Option<String> {
    Url::parse(normalized_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_default_port_and_fragment() {
        let n = normalize("HTTPS://Example.com:443/a/b#frag").unwrap();
        assert_eq!(n, "https://example.com/a/b");
    }

    #[test]
    fn keeps_non_default_port() {
        let n = normalize("http://example.com:8080/x").unwrap();
        assert_eq!(n, "http://example.com:8080/x");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("https://EXAMPLE.com:443/a?b=1&a=2").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_query_order() {
        let n = normalize("https://example.com/?b=1&a=2").unwrap();
        assert_eq!(n, "https://example.com/?b=1&a=2");
    }
}
