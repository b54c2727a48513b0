use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::message::{OutboundRequest, UpstreamResponse};

/// Custom error type for HTTP client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Connection to the upstream failed (refused, DNS, TLS handshake, reset)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The upstream did not answer within the allotted time
    #[error("Timeout error after {0:?}")]
    Timeout(Duration),

    /// The request could not be turned into a valid HTTP request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for calling upstream servers
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send a request upstream and read the full response
    ///
    /// # Arguments
    /// * `req` - The fully built outbound request
    /// * `timeout` - Upper bound for connecting, sending and reading the response body
    ///
    /// # Returns
    /// The upstream response whatever its status, or a transport-level error
    async fn send_request(
        &self,
        req: OutboundRequest,
        timeout: Duration,
    ) -> HttpClientResult<UpstreamResponse>;
}
