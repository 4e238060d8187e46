//! Route table and resolution.
//!
//! # Responsibilities
//! - Hold the compiled routes of one configuration generation
//! - Resolve an incoming (method, host, path, query) to the single best route
//!
//! # Design Decisions
//! - Immutable after construction; reload publishes a whole new table
//! - Candidates are ranked by template priority (bounded beats catch-all),
//!   ties broken by configuration order
//! - Explicit RouteNotFound rather than a silent default

use std::sync::Arc;

use axum::http::Method;

use crate::config::{GatewayConfig, RouteConfig};
use crate::routing::route::Route;
use crate::routing::template::TemplateError;

/// An ordered, immutable collection of compiled routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

/// Returned when no route accepts a request.
#[derive(Debug, thiserror::Error)]
#[error("no route matches {method} {path}")]
pub struct RouteNotFound {
    pub method: Method,
    pub path: String,
}

impl RouteTable {
    /// Build a table from configuration, preserving definition order.
    ///
    /// Routes whose template fails to compile are skipped with an error log;
    /// one malformed route must not take the rest of the table down.
    pub fn build(config: &GatewayConfig) -> Self {
        Self::from_route_configs(&config.routes, config)
    }

    fn from_route_configs(configs: &[RouteConfig], config: &GatewayConfig) -> Self {
        let mut routes = Vec::with_capacity(configs.len());
        for route_config in configs {
            match Route::build(route_config, &config.global) {
                Ok(route) => routes.push(Arc::new(route)),
                Err(e) => {
                    tracing::error!(
                        template = %route_config.upstream_path_template,
                        error = %e,
                        "Skipping route with invalid template"
                    );
                }
            }
        }
        Self { routes }
    }

    /// Number of routes in the table.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All routes in configuration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Resolve a request to the single best-matching route.
    ///
    /// `query` is the raw query string including its leading `?`, or empty.
    /// Deterministic: an unchanged table always resolves the same request to
    /// the same route.
    pub fn resolve(
        &self,
        method: &Method,
        host: &str,
        path: &str,
        query: &str,
    ) -> Result<Arc<Route>, RouteNotFound> {
        let mut best: Option<&Arc<Route>> = None;

        for route in &self.routes {
            if !route.allows_method(method) || !route.accepts_host(host) {
                continue;
            }
            if !route.template().matches(path, query) {
                continue;
            }
            // Strictly-greater keeps the earliest-registered route on ties.
            match best {
                Some(current) if route.template().priority() <= current.template().priority() => {}
                _ => best = Some(route),
            }
        }

        best.cloned().ok_or_else(|| RouteNotFound {
            method: method.clone(),
            path: path.to_string(),
        })
    }
}
