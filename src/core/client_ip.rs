//! Best-effort extraction of the real client address.
use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Headers consulted for the client address, highest precedence first.
const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-client-ip", "x-real-ip"];

// Dotted quad without range checks, or anything made of hex digits and colons.
static IP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$|^[a-fA-F0-9:]+$").expect("valid regex")
});

/// Derive the client IP from forwarding headers, falling back to the peer address.
///
/// The first of `X-Forwarded-For`, `X-Client-IP` and `X-Real-IP` that carries a
/// non-empty value wins and only its first comma-separated entry is considered.
/// A candidate that does not validate yields `None` rather than falling through
/// to lower-precedence sources.
pub fn extract_client_ip(headers: &HeaderMap, fallback_remote_addr: Option<&str>) -> Option<String> {
    let from_headers = CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .filter(|value| !value.as_bytes().is_empty())
    });

    match from_headers {
        // A value that is not visible ASCII cannot hold an address
        Some(value) => {
            let first = value.to_str().ok()?.split(',').next().unwrap_or_default().trim();
            sanitize_ip(first)
        }
        None => sanitize_ip(fallback_remote_addr.unwrap_or_default()),
    }
}

/// Strip a trailing `:port` and validate what remains.
///
/// Everything from the first colon is dropped, so a bare IPv6 literal is
/// truncated as well (`2001:db8::1` becomes `2001`).
pub fn sanitize_ip(candidate: &str) -> Option<String> {
    let candidate = candidate.split(':').next().unwrap_or_default();
    IP_PATTERN
        .is_match(candidate)
        .then(|| candidate.to_string())
}
