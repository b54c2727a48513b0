//! Redirector - a small HTTP forwarding front.
//!
//! The redirector exposes a handful of fixed entry points and relays each
//! request to a configured upstream, hiding the upstream's address from clients.
//! It is stateless: every request triggers exactly one upstream call and the
//! upstream's answer is relayed back (status, sanitized headers, body).
//!
//! # Routes
//! - a GET-only route forwarding to one upstream URL
//! - a POST-only route forwarding to another
//! - a general-purpose route accepting any method plus a wildcard path suffix
//!   and the query string, forwarding to a web upstream
//!
//! # Behaviour
//! - Hop-by-hop headers are removed in both directions; `Host` and
//!   `Content-Length` are recomputed for the upstream.
//! - The client IP is taken from `X-Forwarded-For`, `X-Client-IP`,
//!   `X-Real-IP` or the peer address and written to `X-Forwarded-For`.
//! - Upstream error statuses are relayed unchanged; unreachable upstreams and
//!   timeouts become `502 Bad Gateway`; anything else is `500`.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use redirector::{
//!     ForwardingEngine, HttpClient, HttpClientAdapter, RouteTable,
//!     adapters::{HttpHandler, build_router},
//!     core::TlsTrustPolicy,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = redirector::config::load_config(None).await?;
//! let routes = RouteTable::from_config(&config)?;
//! let client: Arc<dyn HttpClient> = Arc::new(HttpClientAdapter::new(TlsTrustPolicy::Verified)?);
//! let engine = Arc::new(ForwardingEngine::new(routes, client.clone(), client));
//! let app = build_router(HttpHandler::new(engine, config.max_body_bytes), &config);
//! # let _ = app;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the forwarding logic inside `core`. The engine never touches axum or hyper
//! directly, so it can be driven from tests with a stub client.
//!
//! # Error Handling
//! Start-up paths return `eyre::Result<T>` with context attached via `WrapErr`.
//! Per-request failures are typed (`ForwardError`, `HttpClientError`) and always
//! end in a response; they never escape to the server loop.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler},
    core::{ForwardingEngine, RouteTable},
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
