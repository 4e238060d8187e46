//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check each route names a downstream target
//! - Validate value shapes (templates, schemes, methods, ports)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig -> Result<(), Vec<_>>
//! - Range-style QoS values are deliberately NOT validated here; the QoS
//!   layer clamps them to defaults at build time

use axum::http::Method;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route {index}: upstream path template must start with '/'")]
    BadTemplate { index: usize },

    #[error("route {index}: placeholder '{name}' must be alphanumeric")]
    BadPlaceholderName { index: usize, name: String },

    #[error("route {index}: needs either downstream_hosts or service_name")]
    NoDownstreamTarget { index: usize },

    #[error("route {index}: downstream scheme '{scheme}' is not http or https")]
    BadScheme { index: usize, scheme: String },

    #[error("route {index}: '{method}' is not an HTTP method")]
    BadMethod { index: usize, method: String },

    #[error("route {index}: downstream host '{host}' has port 0")]
    BadPort { index: usize, host: String },

    #[error("discovery provider '{provider}' is unknown (expected 'static' or 'polling')")]
    UnknownDiscoveryProvider { provider: String },
}

/// Validate a parsed configuration. Returns every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, route) in config.routes.iter().enumerate() {
        if !route.upstream_path_template.starts_with('/') {
            errors.push(ValidationError::BadTemplate { index });
        }

        for name in placeholder_names(&route.upstream_path_template) {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                errors.push(ValidationError::BadPlaceholderName { index, name });
            }
        }

        if route.service_name.is_none() && route.downstream_hosts.is_empty() {
            errors.push(ValidationError::NoDownstreamTarget { index });
        }

        if !matches!(route.downstream_scheme.as_str(), "http" | "https") {
            errors.push(ValidationError::BadScheme {
                index,
                scheme: route.downstream_scheme.clone(),
            });
        }

        for method in &route.upstream_http_methods {
            if Method::from_bytes(method.to_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::BadMethod {
                    index,
                    method: method.clone(),
                });
            }
        }

        for host in &route.downstream_hosts {
            if host.port == 0 {
                errors.push(ValidationError::BadPort {
                    index,
                    host: host.host.clone(),
                });
            }
        }
    }

    if !matches!(config.discovery.provider.as_str(), "static" | "polling") {
        errors.push(ValidationError::UnknownDiscoveryProvider {
            provider: config.discovery.provider.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn placeholder_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                names.push(rest[open + 1..open + close].to_string());
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    names
}
