use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{MethodFilter, any, on},
};
use tower_http::trace::TraceLayer;
use url::form_urlencoded;

use crate::{
    config::ServerConfig,
    core::{
        ForwardingEngine, RouteMatch,
        message::{InboundRequest, RelayedResponse},
        routes::Route,
    },
};

/// Host adapter between axum and the forwarding engine.
///
/// Converts axum requests into [`InboundRequest`]s, picks up the peer address
/// from `ConnectInfo` when the server provides it, and turns the engine's
/// [`RelayedResponse`] back into an axum response.
#[derive(Clone)]
pub struct HttpHandler {
    engine: Arc<ForwardingEngine>,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(engine: Arc<ForwardingEngine>, max_body_bytes: usize) -> Self {
        Self {
            engine,
            max_body_bytes,
        }
    }

    /// Handle one request dispatched to `target`.
    pub async fn handle_request(&self, req: Request, target: RouteMatch) -> Response<Body> {
        let inbound = match self.to_inbound(req).await {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::error!(route = %target.name, "Failed to read inbound request: {e:?}");
                return RelayedResponse::internal_error().into_response();
            }
        };

        self.engine.forward(&inbound, &target).await.into_response()
    }

    async fn to_inbound(&self, req: Request) -> Result<InboundRequest, axum::Error> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes).await?;

        let query = parts
            .uri
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());

        Ok(InboundRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers,
            body,
            remote_addr,
        })
    }
}

impl IntoResponse for RelayedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Build the axum router exposing every configured route.
///
/// Fixed routes only accept their own method (others get 405). Every route also
/// answers with a trailing slash; for wildcard routes that is an empty suffix.
/// Wildcard routes additionally get `<name>/{*path}`, with the suffix taken from
/// the raw request path so percent-encoding survives unchanged.
pub fn build_router(handler: HttpHandler, config: &ServerConfig) -> Router {
    let mut router = Router::new();

    for route in handler.engine.routes().iter() {
        let mount = config.mount_path(&route.name);
        tracing::info!(
            "Configured route: {} -> {} (method: {}, timeout: {:?}, trust: {:?})",
            mount,
            route.upstream,
            route.method.as_ref().map_or("any", |m| m.as_str()),
            route.timeout,
            route.trust
        );

        let slash_mount = format!("{mount}/");
        // axum's catch-all never matches an empty segment, so `<name>/` is its own route
        let slash_prefix = route.accepts_wildcard.then(|| slash_mount.clone());
        router = router
            .route(&mount, method_router(route, handler.clone(), None))
            .route(
                &slash_mount,
                method_router(route, handler.clone(), slash_prefix.clone()),
            );
        if route.accepts_wildcard {
            router = router.route(
                &format!("{mount}/{{*path}}"),
                method_router(route, handler.clone(), slash_prefix),
            );
        }
    }

    router.layer(TraceLayer::new_for_http())
}

fn method_router(
    route: &Route,
    handler: HttpHandler,
    wildcard_prefix: Option<String>,
) -> axum::routing::MethodRouter {
    let name = route.name.clone();
    let serve = move |req: Request| {
        let handler = handler.clone();
        let name = name.clone();
        let wildcard_prefix = wildcard_prefix.clone();
        async move {
            let target = match wildcard_prefix {
                Some(prefix) => {
                    let suffix = req.uri().path().strip_prefix(&prefix).unwrap_or_default();
                    RouteMatch::wildcard(name, suffix)
                }
                None => RouteMatch::exact(name),
            };
            handler.handle_request(req, target).await
        }
    };

    match &route.method {
        None => any(serve),
        Some(method) => match MethodFilter::try_from(method.clone()) {
            Ok(filter) => on(filter, serve),
            Err(_) => {
                tracing::error!("Route '{}' has unsupported method {}", route.name, method);
                any(|| async { StatusCode::METHOD_NOT_ALLOWED })
            }
        },
    }
}
