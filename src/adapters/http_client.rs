use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eyre::Result;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Uri, Version};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tokio::time::timeout;
use tracing::Instrument;

use crate::{
    adapters::tls::build_tls_config,
    core::{
        message::{OutboundRequest, UpstreamResponse},
        routes::TlsTrustPolicy,
    },
    ports::http_client::{HttpClient, HttpClientError, HttpClientResult},
};

/// HTTP client adapter using Hyper with Rustls.
///
/// Responsibilities:
/// * Applies the configured TLS trust policy to `https` upstreams
/// * Forces request version to HTTP/1.1
/// * Bounds connect, send and body read by a single timeout
/// * Reads the full upstream body so the response can be relayed byte for byte
///
/// The `Host` header is filled in by hyper from the target URI. There are no
/// retries; one call per request.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    trust: TlsTrustPolicy,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter for the given trust policy.
    pub fn new(trust: TlsTrustPolicy) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let tls_config = build_tls_config(trust)?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https_connector);

        tracing::info!("Created upstream HTTP client (trust policy: {:?})", trust);
        Ok(Self { client, trust })
    }

    fn build_request(req: OutboundRequest) -> HttpClientResult<Request<Full<Bytes>>> {
        let uri: Uri = req
            .url
            .parse()
            .map_err(|e| HttpClientError::InvalidRequest(format!("bad URI '{}': {e}", req.url)))?;
        if uri.host().is_none() {
            return Err(HttpClientError::InvalidRequest(format!(
                "Outgoing URI has no host: {uri}"
            )));
        }

        let mut request = Request::builder()
            .method(req.method)
            .uri(uri)
            .version(Version::HTTP_11)
            .body(Full::new(req.body.unwrap_or_default()))
            .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = req.headers;
        Ok(request)
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        req: OutboundRequest,
        timeout_after: Duration,
    ) -> HttpClientResult<UpstreamResponse> {
        let request = Self::build_request(req)?;

        let backend_identifier = format!(
            "{}://{}",
            request.uri().scheme_str().unwrap_or("http"),
            request
                .uri()
                .authority()
                .map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );
        let span = tracing::info_span!(
            "backend_request",
            backend.url = %backend_identifier,
            http.method = %request.method(),
            http.path = %request.uri().path(),
            http.status_code = tracing::field::Empty,
            tls.trust = ?self.trust,
        );

        let client = self.client.clone();
        async move {
            tracing::debug!("Outgoing request headers: {:?}", request.headers());

            let exchange = async move {
                let response = client
                    .request(request)
                    .await
                    .map_err(|e| HttpClientError::ConnectionError(format!("{e:?}")))?;
                let (parts, body) = response.into_parts();
                let body = body
                    .collect()
                    .await
                    .map_err(|e| {
                        HttpClientError::ConnectionError(format!(
                            "failed reading upstream body: {e}"
                        ))
                    })?
                    .to_bytes();
                Ok::<_, HttpClientError>(UpstreamResponse {
                    status: parts.status,
                    headers: parts.headers,
                    body,
                })
            };

            match timeout(timeout_after, exchange).await {
                Ok(Ok(response)) => {
                    tracing::Span::current().record("http.status_code", response.status.as_u16());
                    Ok(response)
                }
                Ok(Err(e)) => {
                    tracing::Span::current().record("http.status_code", 599u16);
                    tracing::error!("Error making request to backend {}: {}", backend_identifier, e);
                    Err(e)
                }
                Err(_) => {
                    tracing::Span::current().record("http.status_code", 599u16);
                    tracing::error!(
                        "Request to backend {} timed out after {:?}",
                        backend_identifier,
                        timeout_after
                    );
                    Err(HttpClientError::Timeout(timeout_after))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, HeaderValue, Method, header};
    use hyper::body::Body as _;

    use super::*;

    fn outbound(url: &str, method: Method, body: Option<&'static str>) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-beacon", HeaderValue::from_static("abc"));
        OutboundRequest {
            url: url.to_string(),
            method,
            headers,
            body: body.map(|b| Bytes::from_static(b.as_bytes())),
        }
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        let verified = HttpClientAdapter::new(TlsTrustPolicy::Verified).unwrap();
        assert_eq!(verified.trust, TlsTrustPolicy::Verified);
        let insecure = HttpClientAdapter::new(TlsTrustPolicy::Insecure).unwrap();
        assert_eq!(insecure.trust, TlsTrustPolicy::Insecure);
    }

    #[test]
    fn test_build_request_carries_method_headers_and_body() {
        let request = HttpClientAdapter::build_request(outbound(
            "http://example.com/api/post",
            Method::POST,
            Some("payload"),
        ))
        .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.headers().get("x-beacon").unwrap(), "abc");
        assert!(!request.headers().contains_key(header::HOST));
        assert_eq!(request.body().size_hint().exact(), Some(7));
    }

    #[test]
    fn test_build_request_rejects_relative_uri() {
        let err = HttpClientAdapter::build_request(outbound("/relative", Method::GET, None))
            .unwrap_err();
        assert!(matches!(err, HttpClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClientAdapter::new(TlsTrustPolicy::Verified).unwrap();
        let result = client
            .send_request(
                outbound(&format!("http://{addr}/"), Method::GET, None),
                Duration::from_secs(5),
            )
            .await;

        assert!(matches!(result, Err(HttpClientError::ConnectionError(_))));
    }
}
