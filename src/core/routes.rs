//! Static route table mapping route names to upstream URLs.
//!
//! Routes are built once from [`ServerConfig`] and never mutated afterwards.
//! Two fixed single-purpose routes exist (GET-only and POST-only, each bound to
//! its own upstream) next to one general-purpose route that accepts any
//! method, an arbitrary wildcard suffix and the inbound query string.
use std::time::Duration;

use eyre::{Result, WrapErr};
use http::Method;

use crate::config::ServerConfig;

/// Which certificate checks the upstream TLS client performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsTrustPolicy {
    /// Native roots, full certificate and hostname verification.
    #[default]
    Verified,
    /// Certificate and hostname verification disabled.
    Insecure,
}

impl TlsTrustPolicy {
    pub fn from_insecure_flag(insecure_allowed: bool) -> Self {
        if insecure_allowed {
            Self::Insecure
        } else {
            Self::Verified
        }
    }
}

/// A single configured route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route identifier, also the path segment it is mounted under.
    pub name: String,
    /// Upstream base URL.
    pub upstream: String,
    /// Allowed method, `None` for any.
    pub method: Option<Method>,
    pub accepts_wildcard: bool,
    pub forwards_query: bool,
    pub timeout: Duration,
    pub trust: TlsTrustPolicy,
}

impl Route {
    /// A single-method route without wildcard or query forwarding.
    pub fn fixed(name: impl Into<String>, upstream: impl Into<String>, method: Method) -> Self {
        Self {
            name: name.into(),
            upstream: upstream.into(),
            method: Some(method),
            accepts_wildcard: false,
            forwards_query: false,
            timeout: Duration::from_secs(10),
            trust: TlsTrustPolicy::Verified,
        }
    }

    /// An any-method route that takes a wildcard suffix and forwards the query string.
    pub fn general(name: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upstream: upstream.into(),
            method: None,
            accepts_wildcard: true,
            forwards_query: true,
            timeout: Duration::from_secs(20),
            trust: TlsTrustPolicy::Verified,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trust(mut self, trust: TlsTrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    /// Upstream URL for this route, with `suffix` appended on wildcard routes.
    pub fn resolve(&self, suffix: &str) -> String {
        if !self.accepts_wildcard || suffix.is_empty() {
            return self.upstream.clone();
        }
        format!(
            "{}/{}",
            self.upstream.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        )
    }
}

/// Immutable collection of routes, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Build the GET, POST and web routes described by the configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let get_timeout = humantime::parse_duration(&config.get_timeout)
            .wrap_err_with(|| format!("Invalid get_timeout '{}'", config.get_timeout))?;
        let post_timeout = humantime::parse_duration(&config.post_timeout)
            .wrap_err_with(|| format!("Invalid post_timeout '{}'", config.post_timeout))?;
        let web_timeout = humantime::parse_duration(&config.web_timeout)
            .wrap_err_with(|| format!("Invalid web_timeout '{}'", config.web_timeout))?;

        let routes = vec![
            Route::fixed(
                &config.teamserver_get_route,
                &config.teamserver_get_url,
                Method::GET,
            )
            .with_timeout(get_timeout),
            Route::fixed(
                &config.teamserver_post_route,
                &config.teamserver_post_url,
                Method::POST,
            )
            .with_timeout(post_timeout),
            Route::general(&config.web_route_base, &config.web_server_url)
                .with_timeout(web_timeout)
                .with_trust(TlsTrustPolicy::from_insecure_flag(
                    config.allow_insecure_ssl,
                )),
        ];

        Ok(Self::new(routes))
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name == name)
    }

    /// Resolve a route name and wildcard suffix to an upstream URL.
    pub fn resolve(&self, name: &str, suffix: &str) -> Option<String> {
        self.get(name).map(|route| route.resolve(suffix))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
