/// Minimal parser for RFC 8288 `Link` headers, enough to find a
/// `rel="..."` target. Good enough for discovering `canonical` and
/// `webmention` relations without pulling in a full header-parsing
/// crate for one field.
pub fn find_rel<'a>(header_value: &'a str, rel: &str) -> Option<&'a str> {
    for entry in header_value.split(',') {
        let mut parts = entry.split(';');
        let url_part = parts.next()?.trim();
        let url = url_part.strip_prefix('<')?.strip_suffix('>')?;
        for param in parts {
            let param = param.trim();
            if let Some(value) = param.strip_prefix("rel=") {
                let value = value.trim_matches('"');
                if value
                    .split_whitespace()
                    .any(|r| r.eq_ignore_ascii_case(rel))
                {
                    return Some(url);
                }
            }
        }
    }
    None
}
