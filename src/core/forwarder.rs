//! Forwarding engine: one inbound request in, one relayed response out.
//!
//! The engine resolves the route, injects the client IP, sanitizes headers,
//! builds the outbound request and executes it through the [`HttpClient`]
//! port. Every outcome is classified into [`ForwardError`] before it is turned
//! into a response, so nothing escapes to the hosting adapter.
//!
//! The engine holds only read-only state and is shared across all in-flight
//! requests behind an `Arc`.
use std::sync::Arc;

use http::{HeaderName, HeaderValue, Method, Uri, header};
use thiserror::Error;
use tracing::Instrument;
use url::form_urlencoded;
use uuid::Uuid;

use crate::{
    core::{
        client_ip::extract_client_ip,
        headers::{sanitize_request_headers, sanitize_response_headers},
        message::{InboundRequest, OutboundRequest, RelayedResponse, UpstreamResponse},
        routes::{Route, RouteTable, TlsTrustPolicy},
    },
    ports::http_client::{HttpClient, HttpClientError},
};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Classified failure of a single forwarding attempt.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ForwardError {
    /// The upstream answered, but with an error status. Relayed verbatim.
    #[error("Upstream {url} responded with status {}", response.status)]
    Upstream {
        url: String,
        response: UpstreamResponse,
    },

    /// The upstream could not be reached or did not answer in time.
    #[error("Upstream {url} unreachable: {reason}")]
    Transport { url: String, reason: String },

    /// Anything else: malformed input, unknown route, unbuildable request.
    #[error("Internal forwarding error: {0}")]
    Internal(String),
}

impl ForwardError {
    /// Convert the failure into the response returned to the client.
    ///
    /// Internal details never reach the body; they are only logged.
    pub fn into_response(self) -> RelayedResponse {
        match self {
            ForwardError::Upstream { response, .. } => relay(response),
            ForwardError::Transport { .. } => RelayedResponse::bad_gateway(),
            ForwardError::Internal(_) => RelayedResponse::internal_error(),
        }
    }

    fn from_client_error(url: String, err: HttpClientError) -> Self {
        match err {
            HttpClientError::ConnectionError(reason) => ForwardError::Transport { url, reason },
            HttpClientError::Timeout(after) => ForwardError::Transport {
                url,
                reason: format!("no response within {after:?}"),
            },
            HttpClientError::InvalidRequest(reason) => {
                ForwardError::Internal(format!("request to {url} could not be built: {reason}"))
            }
        }
    }
}

/// A dispatched route plus the wildcard path captured by the host adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub name: String,
    pub suffix: String,
}

impl RouteMatch {
    pub fn exact(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: String::new(),
        }
    }

    pub fn wildcard(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
        }
    }
}

fn relay(response: UpstreamResponse) -> RelayedResponse {
    RelayedResponse {
        status: response.status,
        headers: sanitize_response_headers(&response.headers),
        body: response.body,
    }
}

/// Orchestrates route resolution, sanitization and the single upstream call.
pub struct ForwardingEngine {
    routes: RouteTable,
    verified_client: Arc<dyn HttpClient>,
    insecure_client: Arc<dyn HttpClient>,
}

impl ForwardingEngine {
    /// Create an engine over a route table.
    ///
    /// `insecure_client` is only used by routes whose trust policy is
    /// [`TlsTrustPolicy::Insecure`]; pass the verified client again when the
    /// insecure toggle is off.
    pub fn new(
        routes: RouteTable,
        verified_client: Arc<dyn HttpClient>,
        insecure_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            routes,
            verified_client,
            insecure_client,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn client_for(&self, trust: TlsTrustPolicy) -> &Arc<dyn HttpClient> {
        match trust {
            TlsTrustPolicy::Verified => &self.verified_client,
            TlsTrustPolicy::Insecure => &self.insecure_client,
        }
    }

    /// Build the outbound request for `inbound` on `route`. No I/O.
    pub fn build_outbound(
        &self,
        inbound: &InboundRequest,
        route: &Route,
        suffix: &str,
    ) -> Result<OutboundRequest, ForwardError> {
        let mut working = inbound.headers.clone();
        match extract_client_ip(&inbound.headers, inbound.remote_addr.as_deref()) {
            Some(client_ip) => {
                let value = HeaderValue::from_str(&client_ip).map_err(|e| {
                    ForwardError::Internal(format!("client IP '{client_ip}' not a header value: {e}"))
                })?;
                working.insert(X_FORWARDED_FOR, value);
            }
            None => tracing::debug!("No valid client IP found, X-Forwarded-For left untouched"),
        }
        let headers = sanitize_request_headers(&working, true);

        let mut url = route.resolve(suffix);
        if route.forwards_query && !inbound.query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(inbound.query.iter())
                .finish();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }

        let uri: Uri = url
            .parse()
            .map_err(|e| ForwardError::Internal(format!("invalid upstream URL '{url}': {e}")))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ForwardError::Internal(format!(
                "upstream URL '{url}' is not absolute"
            )));
        }

        let body = if inbound.method == Method::GET {
            None
        } else {
            Some(inbound.body.clone())
        };

        Ok(OutboundRequest {
            url,
            method: inbound.method.clone(),
            headers,
            body,
        })
    }

    /// Forward `inbound` on the matched route. Always produces a response.
    pub async fn forward(&self, inbound: &InboundRequest, target: &RouteMatch) -> RelayedResponse {
        let span = tracing::info_span!(
            "forward",
            request.id = %Uuid::new_v4(),
            route = %target.name,
            http.method = %inbound.method,
            http.path = %inbound.path,
            http.status_code = tracing::field::Empty,
        );

        async move {
            let response = match self.try_forward(inbound, target).await {
                Ok(response) => {
                    tracing::info!("Relayed upstream response with status {}", response.status);
                    response
                }
                Err(err) => {
                    match &err {
                        ForwardError::Upstream { .. } => tracing::warn!("{err}"),
                        ForwardError::Transport { .. } => tracing::error!("{err}"),
                        ForwardError::Internal(_) => {
                            tracing::error!(error = ?err, "Unexpected error while forwarding")
                        }
                    }
                    err.into_response()
                }
            };
            tracing::Span::current().record("http.status_code", response.status.as_u16());
            response
        }
        .instrument(span)
        .await
    }

    async fn try_forward(
        &self,
        inbound: &InboundRequest,
        target: &RouteMatch,
    ) -> Result<RelayedResponse, ForwardError> {
        let route = self
            .routes
            .get(&target.name)
            .ok_or_else(|| ForwardError::Internal(format!("no route named '{}'", target.name)))?;

        let outbound = self.build_outbound(inbound, route, &target.suffix)?;
        let url = outbound.url.clone();
        tracing::debug!("Forwarding {} {} (timeout {:?})", outbound.method, url, route.timeout);

        let response = self
            .client_for(route.trust)
            .send_request(outbound, route.timeout)
            .await
            .map_err(|e| ForwardError::from_client_error(url.clone(), e))?;

        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(ForwardError::Upstream { url, response });
        }
        Ok(relay(response))
    }
}
