//! Configuration data structures for the redirector.
//!
//! Keys map one-to-one onto environment variables (upper-cased) and onto keys of
//! an optional TOML / YAML / JSON file. Every field has a default so an empty
//! environment still yields a runnable configuration.
use serde::{Deserialize, Serialize};

/// Output format of the log pipeline.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,
    /// Optional path prefix all routes are mounted under (e.g. "api").
    pub route_prefix: String,

    /// Upstream for the GET-only route.
    pub teamserver_get_url: String,
    /// Upstream for the POST-only route.
    pub teamserver_post_url: String,
    /// Upstream for the general-purpose web route.
    pub web_server_url: String,
    /// Disable certificate and hostname checks towards the web upstream.
    pub allow_insecure_ssl: bool,

    pub teamserver_get_route: String,
    pub teamserver_post_route: String,
    pub web_route_base: String,

    // Parsed by humantime, e.g. "10s", "1m 30s"
    pub get_timeout: String,
    pub post_timeout: String,
    pub web_timeout: String,

    /// Largest inbound body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            route_prefix: String::new(),
            teamserver_get_url: "https://your-c2-domain.com/api/get".to_string(),
            teamserver_post_url: "https://your-c2-domain.com/api/post".to_string(),
            web_server_url: "http://example.com".to_string(),
            allow_insecure_ssl: false,
            teamserver_get_route: "get".to_string(),
            teamserver_post_route: "post".to_string(),
            web_route_base: "web".to_string(),
            get_timeout: "10s".to_string(),
            post_timeout: "15s".to_string(),
            web_timeout: "20s".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ServerConfig {
    /// Path a route is served under, including the optional prefix.
    pub fn mount_path(&self, route_name: &str) -> String {
        let prefix = self.route_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("/{route_name}")
        } else {
            format!("/{prefix}/{route_name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.teamserver_get_route, "get");
        assert_eq!(config.teamserver_post_route, "post");
        assert_eq!(config.web_route_base, "web");
        assert!(!config.allow_insecure_ssl);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn mount_path_honours_prefix() {
        let mut config = ServerConfig::default();
        assert_eq!(config.mount_path("get"), "/get");

        config.route_prefix = "/api/".to_string();
        assert_eq!(config.mount_path("web"), "/api/web");
    }
}
