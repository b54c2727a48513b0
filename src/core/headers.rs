//! Header sanitization applied in both directions.
//!
//! Hop-by-hop headers only make sense for a single connection and are never
//! carried across the redirector. On the way out `Content-Length` is always
//! dropped (the client recomputes it from the actual body) and `Host` is
//! dropped on request so the client derives it from the target URL.
use http::{HeaderMap, HeaderName, header};

/// Connection-scoped headers stripped from requests and responses alike.
pub const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// `HeaderName` is always lowercase, so equality here is case-insensitive
/// with respect to whatever casing arrived on the wire.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
}

/// Filter headers before they are sent upstream.
pub fn sanitize_request_headers(headers: &HeaderMap, drop_host: bool) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        if drop_host && name == header::HOST {
            continue;
        }
        sanitized.append(name.clone(), value.clone());
    }
    sanitized
}

/// Filter headers of an upstream response before relaying them.
pub fn sanitize_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            sanitized.append(name.clone(), value.clone());
        }
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn noisy_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("Connection", "keep-alive"),
            ("Keep-Alive", "timeout=5"),
            ("Proxy-Authenticate", "Basic"),
            ("PROXY-AUTHORIZATION", "Basic Zm9vOmJhcg=="),
            ("TE", "trailers"),
            ("Trailer", "Expires"),
            ("Transfer-Encoding", "chunked"),
            ("Upgrade", "websocket"),
            ("Host", "redirector.local"),
            ("Content-Length", "42"),
            ("Accept", "*/*"),
            ("X-Custom", "kept"),
        ] {
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static(value),
            );
        }
        headers
    }

    #[test]
    fn request_sanitization_strips_hop_by_hop_host_and_length() {
        let sanitized = sanitize_request_headers(&noisy_headers(), true);

        for name in HOP_BY_HOP_HEADERS.iter() {
            assert!(!sanitized.contains_key(name), "{name} should be removed");
        }
        assert!(!sanitized.contains_key(header::HOST));
        assert!(!sanitized.contains_key(header::CONTENT_LENGTH));
        assert_eq!(sanitized.get("x-custom").unwrap(), "kept");
        assert_eq!(sanitized.get(header::ACCEPT).unwrap(), "*/*");
        assert_eq!(sanitized.len(), 2);
    }

    #[test]
    fn request_sanitization_can_keep_host() {
        let sanitized = sanitize_request_headers(&noisy_headers(), false);

        assert_eq!(sanitized.get(header::HOST).unwrap(), "redirector.local");
        assert!(!sanitized.contains_key(header::CONTENT_LENGTH));
    }

    #[test]
    fn response_sanitization_keeps_length_and_host() {
        let sanitized = sanitize_response_headers(&noisy_headers());

        for name in HOP_BY_HOP_HEADERS.iter() {
            assert!(!sanitized.contains_key(name));
        }
        assert_eq!(sanitized.get(header::CONTENT_LENGTH).unwrap(), "42");
        assert_eq!(sanitized.get(header::HOST).unwrap(), "redirector.local");
        assert_eq!(sanitized.len(), 4);
    }

    #[test]
    fn sanitization_preserves_order_and_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("x-first", HeaderValue::from_static("1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::CONNECTION, HeaderValue::from_static("close"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.append("x-last", HeaderValue::from_static("2"));

        let sanitized = sanitize_response_headers(&headers);

        let names: Vec<&str> = sanitized.keys().map(|name| name.as_str()).collect();
        assert_eq!(names, vec!["x-first", "set-cookie", "x-last"]);
        let cookies: Vec<_> = sanitized.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }
}
