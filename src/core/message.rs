//! Request and response shapes seen by the forwarding engine.
//!
//! These types carry exactly what the engine needs and nothing tied to a
//! particular hosting platform. The axum adapter converts to and from them.
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, header};

/// A request as received from the hosting adapter. Immutable once built.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    /// Decoded query parameters in the order they were received.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Transport-level peer address, used as the last client IP fallback.
    pub remote_addr: Option<String>,
}

impl InboundRequest {
    /// Start a request with no query, headers, body or peer address.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }
}

/// The request handed to the upstream client. Built fresh for every inbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// `None` for GET, the inbound body otherwise.
    pub body: Option<Bytes>,
}

/// What the upstream answered, with the body fully read.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The response returned to the caller of the engine.
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RelayedResponse {
    /// Plain-text response used for the fixed error bodies.
    pub fn plain_text(status: StatusCode, body: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    /// 502 returned when the upstream could not be reached.
    pub fn bad_gateway() -> Self {
        Self::plain_text(StatusCode::BAD_GATEWAY, "Bad Gateway")
    }

    /// 500 returned for anything that is neither a relay nor a transport failure.
    pub fn internal_error() -> Self {
        Self::plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}
