use url::Url;

/// Accepts only `http://` and `https://` targets (case-insensitive scheme).
pub fn is_http_url(raw: &str) -> bool {
    let raw = raw.trim();
    let lower = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Canonical form used as a cache/dedupe key.
///
/// Lowercases scheme and host, drops the fragment and a trailing slash.
/// Unparseable input falls back to its trimmed, lowercased text.
pub fn normalize_url_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut normalized = url.to_string();
            while normalized.ends_with('/') {
                normalized.pop();
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}

/// Trims a job id; blank ids are treated as missing.
pub fn clean_job_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{clean_job_id, is_http_url, normalize_url_for_dedupe};

    #[test]
    fn http_scheme_check_is_case_insensitive() {
        assert!(is_http_url("https://example.com"));
        assert!(is_http_url("HTTP://EXAMPLE.COM"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
        assert!(!is_http_url(""));
    }

    #[test]
    fn normalization_collapses_variants() {
        let a = normalize_url_for_dedupe("https://example.com/");
        assert_eq!(a, normalize_url_for_dedupe("HTTPS://EXAMPLE.COM"));
        assert_eq!(a, normalize_url_for_dedupe("  https://example.com/#top  "));
        assert_ne!(a, normalize_url_for_dedupe("https://example.com/docs"));
    }

    #[test]
    fn blank_job_ids_are_missing() {
        assert_eq!(clean_job_id(None), None);
        assert_eq!(clean_job_id(Some("   ")), None);
        assert_eq!(clean_job_id(Some(" abc ")), Some("abc"));
    }
}
