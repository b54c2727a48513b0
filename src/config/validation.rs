#![allow(clippy::collapsible_if)]

use std::net::SocketAddr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::models::ServerConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

// Route names become literal path segments; keep them to URL-safe characters.
static ROUTE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._~-]+(?:/[A-Za-z0-9._~-]+)*$").expect("valid route name regex")
});

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, collecting every problem found
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        for (field, url) in [
            ("teamserver_get_url", &config.teamserver_get_url),
            ("teamserver_post_url", &config.teamserver_post_url),
            ("web_server_url", &config.web_server_url),
        ] {
            if let Err(e) = Self::validate_url(url, field) {
                errors.push(e);
            }
        }

        let routes = [
            ("teamserver_get_route", &config.teamserver_get_route),
            ("teamserver_post_route", &config.teamserver_post_route),
            ("web_route_base", &config.web_route_base),
        ];
        for (field, name) in routes {
            if let Err(e) = Self::validate_route_name(name, field) {
                errors.push(e);
            }
        }
        if let Err(mut conflicts) = Self::check_route_conflicts(&routes) {
            errors.append(&mut conflicts);
        }

        if !config.route_prefix.trim_matches('/').is_empty() {
            if let Err(e) =
                Self::validate_route_name(config.route_prefix.trim_matches('/'), "route_prefix")
            {
                errors.push(e);
            }
        }

        for (field, value) in [
            ("get_timeout", &config.get_timeout),
            ("post_timeout", &config.post_timeout),
            ("web_timeout", &config.web_timeout),
        ] {
            if let Err(e) = Self::validate_timeout(value, field) {
                errors.push(e);
            }
        }

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "max_body_bytes".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if tracing_subscriber::EnvFilter::try_new(&config.log_level).is_err() {
            errors.push(ValidationError::InvalidField {
                field: "log_level".to_string(),
                message: format!("Invalid log filter directive '{}'", config.log_level),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn validate_route_name(name: &str, context: &str) -> ValidationResult<()> {
        if name.is_empty() {
            return Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: "Route name cannot be empty".to_string(),
            });
        }
        if !ROUTE_NAME_PATTERN.is_match(name) {
            return Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!(
                    "Invalid route name '{name}': use letters, digits, '-', '_', '.', '~' and inner '/'"
                ),
            });
        }
        Ok(())
    }

    fn validate_timeout(value: &str, context: &str) -> ValidationResult<()> {
        match humantime::parse_duration(value) {
            Ok(duration) if duration.is_zero() => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: "Timeout must be greater than zero".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid duration '{value}': {e}"),
            }),
        }
    }

    /// Route names must be distinct, and the web route must not shadow another
    /// route through its wildcard.
    fn check_route_conflicts(routes: &[(&str, &String)]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (i, (field_a, name_a)) in routes.iter().enumerate() {
            for (field_b, name_b) in routes.iter().skip(i + 1) {
                if name_a == name_b {
                    errors.push(ValidationError::RouteConflict {
                        message: format!("{field_a} and {field_b} both use '{name_a}'"),
                    });
                }
            }
        }

        if let Some((_, web)) = routes.iter().find(|(field, _)| *field == "web_route_base") {
            let web_prefix = format!("{web}/");
            for (field, name) in routes.iter().filter(|(field, _)| *field != "web_route_base") {
                if name.starts_with(&web_prefix) {
                    errors.push(ValidationError::RouteConflict {
                        message: format!("{field} '{name}' lies under the web wildcard '{web}/*'"),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
