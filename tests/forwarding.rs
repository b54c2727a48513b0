//! End-to-end forwarding through the axum router against a local mock upstream.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::any,
};
use http_body_util::{BodyExt, Full};
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use redirector::{
    adapters::{HttpClientAdapter, HttpHandler, build_router},
    config::ServerConfig,
    core::{ForwardingEngine, RouteTable, TlsTrustPolicy},
    ports::http_client::HttpClient,
};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// Echoes method, path + query, headers and body back as JSON.
async fn echo(req: Request) -> impl IntoResponse {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.unwrap().to_bytes();

    let mut headers = Map::new();
    for name in parts.headers.keys() {
        let values: Vec<&str> = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        headers.insert(name.to_string(), Value::from(values.join(", ")));
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert("x-upstream", HeaderValue::from_static("mock"));
    response_headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));

    (
        response_headers,
        Json(json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "headers": headers,
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/site/missing",
            any(|| async { (StatusCode::NOT_FOUND, "nope") }),
        )
        .route(
            "/site/slow",
            any(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        )
        .fallback(echo);
    spawn(app).await
}

fn config_for(upstream: SocketAddr) -> ServerConfig {
    ServerConfig {
        teamserver_get_url: format!("http://{upstream}/api/get"),
        teamserver_post_url: format!("http://{upstream}/api/post"),
        web_server_url: format!("http://{upstream}/site"),
        web_timeout: "300ms".to_string(),
        ..ServerConfig::default()
    }
}

async fn spawn_redirector(config: ServerConfig) -> SocketAddr {
    let routes = RouteTable::from_config(&config).unwrap();
    let client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new(TlsTrustPolicy::Verified).unwrap());
    let engine = Arc::new(ForwardingEngine::new(routes, client.clone(), client));
    spawn(build_router(HttpHandler::new(engine, config.max_body_bytes), &config)).await
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(
    addr: SocketAddr,
    method: Method,
    path: &str,
    headers: &[(&str, &str)],
    body: &'static str,
) -> Reply {
    let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(format!("http://{addr}{path}"));
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap();

    let response = client.request(request).await.unwrap();
    let (parts, body) = response.into_parts();
    Reply {
        status: parts.status,
        headers: parts.headers,
        body: body.collect().await.unwrap().to_bytes(),
    }
}

#[tokio::test]
async fn get_route_drops_body_and_sets_client_ip() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(
        redirector,
        Method::GET,
        "/get",
        &[("x-beacon", "abc")],
        "ignored",
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    let echoed = reply.json();
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["uri"], "/api/get");
    assert_eq!(echoed["body"], "");
    assert_eq!(echoed["headers"]["x-beacon"], "abc");
    assert_eq!(echoed["headers"]["x-forwarded-for"], "127.0.0.1");
    assert_eq!(echoed["headers"]["host"], upstream.to_string());
}

#[tokio::test]
async fn post_route_forwards_body() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(redirector, Method::POST, "/post", &[], "payload").await;

    assert_eq!(reply.status, StatusCode::OK);
    let echoed = reply.json();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["uri"], "/api/post");
    assert_eq!(echoed["body"], "payload");
    assert_eq!(echoed["headers"]["content-length"], "7");
}

#[tokio::test]
async fn web_route_appends_path_and_query() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(
        redirector,
        Method::PUT,
        "/web/a/b?x=1&y=two%20words",
        &[],
        "data",
    )
    .await;

    let echoed = reply.json();
    assert_eq!(echoed["method"], "PUT");
    assert_eq!(echoed["uri"], "/site/a/b?x=1&y=two+words");
    assert_eq!(echoed["body"], "data");
}

#[tokio::test]
async fn forwarded_for_uses_first_listed_address() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(
        redirector,
        Method::GET,
        "/get",
        &[
            ("x-forwarded-for", "198.51.100.7, 10.0.0.1"),
            ("x-real-ip", "192.0.2.1"),
        ],
        "",
    )
    .await;

    assert_eq!(reply.json()["headers"]["x-forwarded-for"], "198.51.100.7");
}

#[tokio::test]
async fn hop_by_hop_headers_stripped_both_ways() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(
        redirector,
        Method::GET,
        "/web/page",
        &[("proxy-authorization", "Basic c2VjcmV0"), ("keep-alive", "timeout=9")],
        "",
    )
    .await;

    assert_eq!(reply.headers.get("x-upstream").unwrap(), "mock");
    assert!(reply.headers.get("keep-alive").is_none());

    let echoed = reply.json();
    assert!(echoed["headers"].get("proxy-authorization").is_none());
    assert!(echoed["headers"].get("keep-alive").is_none());
}

#[tokio::test]
async fn upstream_error_status_is_relayed() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(redirector, Method::GET, "/web/missing", &[], "").await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, Bytes::from_static(b"nope"));
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let redirector = spawn_redirector(config_for(closed)).await;

    let reply = send(redirector, Method::POST, "/post", &[], "payload").await;

    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(reply.body, Bytes::from_static(b"Bad Gateway"));
}

#[tokio::test]
async fn slow_upstream_times_out_as_bad_gateway() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(redirector, Method::GET, "/web/slow", &[], "").await;

    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn wrong_method_and_unknown_path_are_rejected_locally() {
    let upstream = spawn_upstream().await;
    let redirector = spawn_redirector(config_for(upstream)).await;

    let reply = send(redirector, Method::POST, "/get", &[], "x").await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);

    let reply = send(redirector, Method::GET, "/admin", &[], "").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
