//! Configuration schema definitions.
//!
//! This module defines the run-time configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Values here are normalized inputs; route compilation happens in the
//! routing subsystem.

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Route definitions mapping upstream requests to downstream services.
    /// Order matters: it breaks priority ties during resolution.
    pub routes: Vec<RouteConfig>,

    /// Global defaults applied when a route leaves a field unset.
    pub global: GlobalConfig,

    /// Service discovery settings.
    pub discovery: DiscoveryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Route configuration.
///
/// A route either names its downstream hosts statically or points at a
/// discovered service, never both.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Upstream path template, e.g. `/api/products/{id}`.
    pub upstream_path_template: String,

    /// Allowed HTTP methods; empty means unrestricted.
    pub upstream_http_methods: Vec<String>,

    /// Optional exact Host header filter.
    pub upstream_host: Option<String>,

    /// Whether path matching is case-sensitive.
    pub case_sensitive: bool,

    /// Downstream scheme ("http" or "https").
    pub downstream_scheme: String,

    /// Downstream path template; placeholders are carried over from the
    /// upstream template.
    pub downstream_path_template: String,

    /// Static downstream hosts. Ignored when `service_name` is set.
    pub downstream_hosts: Vec<HostAndPortConfig>,

    /// Service-discovery key; takes precedence over `downstream_hosts`.
    pub service_name: Option<String>,

    /// Optional namespace qualifying `service_name`.
    pub service_namespace: Option<String>,

    /// Load-balancer selection for this route.
    pub load_balancer: LoadBalancerOptions,

    /// Quality-of-service settings; absent means no timeout and no breaker.
    pub qos: Option<QosOptions>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            upstream_path_template: "/".to_string(),
            upstream_http_methods: Vec::new(),
            upstream_host: None,
            case_sensitive: false,
            downstream_scheme: "http".to_string(),
            downstream_path_template: "/".to_string(),
            downstream_hosts: Vec::new(),
            service_name: None,
            service_namespace: None,
            load_balancer: LoadBalancerOptions::default(),
            qos: None,
        }
    }
}

/// A downstream host and port.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostAndPortConfig {
    /// Host name or address, without a scheme prefix.
    pub host: String,

    /// Port, greater than zero.
    pub port: u16,

    /// Optional per-host scheme override.
    #[serde(default)]
    pub scheme: Option<String>,
}

/// Load-balancer options for a route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerOptions {
    /// Strategy name: "NoLoadBalancer", "RoundRobin", "LeastConnection" or
    /// "CookieStickySessions". Empty falls back to the global default.
    pub strategy: String,

    /// Cookie name used by sticky sessions.
    pub key: Option<String>,

    /// Sticky-session expiry in milliseconds (sliding).
    pub expiry_ms: u64,

    /// Explicit balancer group; routes sharing a group share one balancer
    /// instance and one lease table.
    pub group: Option<String>,
}

impl Default for LoadBalancerOptions {
    fn default() -> Self {
        Self {
            strategy: String::new(),
            key: None,
            expiry_ms: default_sticky_expiry_ms(),
            group: None,
        }
    }
}

/// Default sticky-session expiry: 20 minutes.
pub fn default_sticky_expiry_ms() -> u64 {
    20 * 60 * 1000
}

/// Quality-of-service options for a route.
///
/// Out-of-range values are never rejected; the QoS layer clamps them to
/// documented defaults so a single bad field cannot take a route out of
/// service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QosOptions {
    /// Downstream call timeout in milliseconds. Unset falls back to the
    /// global default, then to the built-in default.
    pub timeout_ms: Option<u64>,

    /// Windowed failures tolerated before the circuit opens. Zero disables
    /// the breaker (the pipeline is then timeout-only).
    pub exceptions_allowed_before_breaking: u32,

    /// How long the circuit stays open, in milliseconds.
    pub duration_of_break_ms: u64,

    /// Failure ratio that also trips the breaker, in (0, 1].
    pub failure_ratio: f64,

    /// Minimum samples in the window before the breaker may act. Zero means
    /// "same as the failure threshold".
    pub minimum_throughput: u32,

    /// Rolling sampling window in milliseconds.
    pub sampling_duration_ms: u64,
}

impl Default for QosOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            exceptions_allowed_before_breaking: 0,
            duration_of_break_ms: 5_000,
            failure_ratio: 0.8,
            minimum_throughput: 0,
            sampling_duration_ms: 10_000,
        }
    }
}

/// Global defaults consumed when a route leaves a field unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default downstream timeout in milliseconds for routes with QoS but no
    /// timeout of their own.
    pub timeout_ms: Option<u64>,

    /// Default load-balancer strategy for routes that name none.
    pub load_balancer: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            load_balancer: "NoLoadBalancer".to_string(),
        }
    }
}

/// Service discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Provider type: "static" serves configured hosts, "polling" refreshes
    /// snapshots on a timer.
    pub provider: String,

    /// Refresh interval for polling providers, in milliseconds.
    pub polling_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            provider: "static".to_string(),
            polling_interval_ms: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
