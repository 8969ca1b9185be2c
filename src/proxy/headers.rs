//! Request header fixes applied before dispatch through the proxy service

use http::header::{HOST, TE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue};
use tracing::{debug, warn};
use url::{Position, Url};

/// Network location of `url` (`[userinfo@]host[:port]`)
pub fn url_netloc(url: &Url) -> &str {
    &url[Position::BeforeUsername..Position::AfterPort]
}

/// Make a non-empty Host header agree with the request URL
///
/// The proxy routes on the URL but some back-ends key off Host, so a mismatch
/// gets rewritten to the URL's network location. Returns true if rewritten.
pub fn correct_host_header(headers: &mut HeaderMap, url: &Url) -> bool {
    let Some(current) = headers.get(HOST) else {
        return false;
    };
    if current.is_empty() {
        return false;
    }

    let url_host = url_netloc(url).trim();
    let header_host = String::from_utf8_lossy(current.as_bytes());
    if header_host.trim() == url_host {
        return false;
    }

    match HeaderValue::from_str(url_host) {
        Ok(value) => {
            debug!(from = %header_host, to = %url_host, "Correcting host header");
            headers.insert(HOST, value);
            true
        }
        Err(_) => false,
    }
}

/// Drop TE and Transfer-Encoding, which the proxy service rejects
///
/// Returns the number of header values removed.
pub fn strip_transfer_encoding(headers: &mut HeaderMap) -> usize {
    let mut removed = 0;
    for name in [TE, TRANSFER_ENCODING] {
        if let http::header::Entry::Occupied(entry) = headers.entry(name) {
            let (name, values) = entry.remove_entry_mult();
            let count = values.count();
            warn!(header = %name, "Dropping unsupported header");
            removed += count;
        }
    }
    removed
}

/// Apply every header fix to a request
pub fn sanitize(headers: &mut HeaderMap, url: &Url) {
    correct_host_header(headers, url);
    strip_transfer_encoding(headers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderName;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_host_header_corrected() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("evil.example"));

        assert!(correct_host_header(&mut headers, &url("https://real.example/path")));
        assert_eq!(headers.get(HOST).unwrap(), "real.example");
    }

    #[test]
    fn test_host_header_matching_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("real.example"));

        assert!(!correct_host_header(&mut headers, &url("https://real.example/path")));
        assert_eq!(headers.get(HOST).unwrap(), "real.example");
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("real.example"));

        assert!(correct_host_header(&mut headers, &url("http://real.example:8080/")));
        assert_eq!(headers.get(HOST).unwrap(), "real.example:8080");
    }

    #[test]
    fn test_missing_or_empty_host_header_ignored() {
        let mut headers = HeaderMap::new();
        assert!(!correct_host_header(&mut headers, &url("https://real.example/")));
        assert!(headers.get(HOST).is_none());

        headers.insert(HOST, HeaderValue::from_static(""));
        assert!(!correct_host_header(&mut headers, &url("https://real.example/")));
        assert_eq!(headers.get(HOST).unwrap(), "");
    }

    #[test]
    fn test_transfer_encoding_headers_stripped_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"te").unwrap(),
            HeaderValue::from_static("trailers"),
        );
        headers.append(
            HeaderName::from_bytes(b"Transfer-encoding").unwrap(),
            HeaderValue::from_static("chunked"),
        );
        headers.append(TRANSFER_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        assert_eq!(strip_transfer_encoding(&mut headers), 3);
        assert!(headers.get(TE).is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers.get("accept").unwrap(), "*/*");
        assert_eq!(strip_transfer_encoding(&mut headers), 0);
    }

    #[test]
    fn test_sanitize_applies_both() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("github.com"));
        headers.insert(TE, HeaderValue::from_static("Trailers"));

        sanitize(&mut headers, &url("https://google.com/"));
        assert_eq!(headers.get(HOST).unwrap(), "google.com");
        assert!(headers.get(TE).is_none());
    }
}
