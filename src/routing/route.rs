//! Compiled route definitions.
//!
//! # Responsibilities
//! - Represent one immutable routing rule (upstream shape -> downstream
//!   dispatch configuration)
//! - Carry the per-route load-balancer and QoS settings consumed on every
//!   request
//!
//! # Design Decisions
//! - Routes are immutable once built; configuration reload replaces the
//!   whole set instead of patching fields, so readers never see torn state
//! - The route name is a deterministic identity used to key the resilience
//!   pipeline cache and, absent a group, the balancer house

use std::hash::{Hash, Hasher};
use std::time::Duration;

use axum::http::Method;
use url::Url;

use crate::config::{GlobalConfig, RouteConfig};
use crate::routing::template::{CompiledTemplate, TemplateError};

/// A downstream endpoint. Compared and hashed by host and port only; the
/// scheme does not participate in lease bookkeeping.
#[derive(Debug, Clone)]
pub struct DownstreamHostAndPort {
    pub host: String,
    pub port: u16,
    pub scheme: Option<String>,
}

impl DownstreamHostAndPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            scheme: None,
        }
    }

    /// Base URL for this endpoint, using `default_scheme` when the host has
    /// no scheme of its own.
    pub fn base_url(&self, default_scheme: &str) -> Result<Url, url::ParseError> {
        let scheme = self.scheme.as_deref().unwrap_or(default_scheme);
        Url::parse(&format!("{}://{}:{}", scheme, self.host, self.port))
    }

    /// `host:port` authority form.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for DownstreamHostAndPort {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for DownstreamHostAndPort {}

impl Hash for DownstreamHostAndPort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl std::fmt::Display for DownstreamHostAndPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where a route's candidate instances come from.
#[derive(Debug, Clone)]
pub enum ServiceSource {
    /// Fixed hosts from configuration.
    Static(Vec<DownstreamHostAndPort>),

    /// A named service resolved through discovery.
    Discovery {
        service: String,
        namespace: Option<String>,
    },
}

/// Load-balancer settings carried by a route.
#[derive(Debug, Clone)]
pub struct LoadBalancerSettings {
    /// Strategy name resolved against the balancer registry.
    pub strategy: String,

    /// Cookie name for sticky sessions.
    pub cookie_name: Option<String>,

    /// Sliding expiry for sticky sessions.
    pub expiry: Duration,

    /// Explicit balancer group shared across routes.
    pub group: Option<String>,
}

/// QoS settings carried by a route. Field semantics and clamping rules live
/// in the qos module.
#[derive(Debug, Clone)]
pub struct QosSettings {
    pub timeout_ms: Option<u64>,
    pub exceptions_allowed_before_breaking: u32,
    pub break_duration_ms: u64,
    pub failure_ratio: f64,
    pub minimum_throughput: u32,
    pub sampling_duration_ms: u64,
}

/// One compiled, immutable routing rule.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    template: CompiledTemplate,
    methods: Vec<Method>,
    upstream_host: Option<String>,
    downstream_scheme: String,
    downstream_path_template: String,
    source: ServiceSource,
    load_balancer: LoadBalancerSettings,
    qos: Option<QosSettings>,
}

impl Route {
    /// Build a route from its configuration, applying global defaults.
    pub fn build(config: &RouteConfig, global: &GlobalConfig) -> Result<Self, TemplateError> {
        let template =
            CompiledTemplate::compile(&config.upstream_path_template, config.case_sensitive)?;

        let methods = config
            .upstream_http_methods
            .iter()
            .filter_map(|m| match Method::from_bytes(m.to_uppercase().as_bytes()) {
                Ok(method) => Some(method),
                Err(_) => {
                    tracing::warn!(method = %m, template = %config.upstream_path_template,
                        "Ignoring unparseable HTTP method");
                    None
                }
            })
            .collect();

        let source = match &config.service_name {
            Some(service) => ServiceSource::Discovery {
                service: service.clone(),
                namespace: config.service_namespace.clone(),
            },
            None => ServiceSource::Static(
                config
                    .downstream_hosts
                    .iter()
                    .map(|h| DownstreamHostAndPort {
                        host: h.host.clone(),
                        port: h.port,
                        scheme: h.scheme.clone(),
                    })
                    .collect(),
            ),
        };

        let strategy = if config.load_balancer.strategy.is_empty() {
            global.load_balancer.clone()
        } else {
            config.load_balancer.strategy.clone()
        };

        let name = route_name(config);

        Ok(Self {
            name,
            template,
            methods,
            upstream_host: config.upstream_host.clone(),
            downstream_scheme: config.downstream_scheme.clone(),
            downstream_path_template: config.downstream_path_template.clone(),
            source,
            load_balancer: LoadBalancerSettings {
                strategy,
                cookie_name: config.load_balancer.key.clone(),
                expiry: Duration::from_millis(config.load_balancer.expiry_ms),
                group: config.load_balancer.group.clone(),
            },
            qos: config.qos.as_ref().map(|q| QosSettings {
                timeout_ms: q.timeout_ms,
                exceptions_allowed_before_breaking: q.exceptions_allowed_before_breaking,
                break_duration_ms: q.duration_of_break_ms,
                failure_ratio: q.failure_ratio,
                minimum_throughput: q.minimum_throughput,
                sampling_duration_ms: q.sampling_duration_ms,
            }),
        })
    }

    /// Deterministic route identity; keys the pipeline cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }

    /// Whether `method` is allowed; an empty method set is unrestricted.
    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Whether the route's host filter accepts `host`. An absent filter
    /// accepts everything.
    pub fn accepts_host(&self, host: &str) -> bool {
        match &self.upstream_host {
            Some(filter) => filter == host,
            None => true,
        }
    }

    pub fn downstream_scheme(&self) -> &str {
        &self.downstream_scheme
    }

    pub fn downstream_path_template(&self) -> &str {
        &self.downstream_path_template
    }

    pub fn source(&self) -> &ServiceSource {
        &self.source
    }

    pub fn load_balancer(&self) -> &LoadBalancerSettings {
        &self.load_balancer
    }

    pub fn qos(&self) -> Option<&QosSettings> {
        self.qos.as_ref()
    }

    /// Key selecting the balancer instance: the explicit group when
    /// configured, the sticky cookie key for sticky routes, otherwise the
    /// route's own name.
    pub fn balancer_key(&self) -> String {
        if let Some(group) = &self.load_balancer.group {
            return group.clone();
        }
        if let Some(cookie) = &self.load_balancer.cookie_name {
            if self.load_balancer.strategy == "CookieStickySessions" {
                return format!("CookieStickySessions:{cookie}");
            }
        }
        self.name.clone()
    }
}

/// Route identity: the service name when discovered, otherwise the host
/// filter and template, otherwise the template alone.
fn route_name(config: &RouteConfig) -> String {
    match (&config.service_name, &config.upstream_host) {
        (Some(service), _) => format!("service/{service}"),
        (None, Some(host)) => format!("{host}|{}", config.upstream_path_template),
        (None, None) => config.upstream_path_template.clone(),
    }
}
