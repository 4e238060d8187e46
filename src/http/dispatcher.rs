//! Request dispatch orchestration.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → route table (resolve)
//!     → service source (static hosts or discovery snapshot)
//!     → balancer house (lease one host, RAII handle)
//!     → pipeline cache (timeout + breaker, or raw call when no QoS)
//!     → downstream transport
//!     → lease released on every exit path, response relayed upstream
//! ```
//!
//! # Design Decisions
//! - The route table, pipeline cache and discovery settings swap atomically
//!   on reload; in-flight requests finish against the old generation
//! - Balancer and provider caches are cleared on reload; stale balancers
//!   release in-flight leases through the handles that own them
//! - No automatic retries: every failure maps to one upstream error

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, Request, Response, Uri};
use dashmap::DashMap;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::{DiscoveryConfig, GatewayConfig};
use crate::discovery::{
    PollingProvider, ProviderRegistry, ServiceDiscovery, ServiceInstance, StaticInstanceProvider,
};
use crate::http::error::GatewayError;
use crate::http::request::request_id;
use crate::load_balancer::{LeaseContext, LoadBalancerHouse};
use crate::observability::metrics;
use crate::qos::PipelineCache;
use crate::routing::template::substitute_placeholders;
use crate::routing::{Route, RouteTable, ServiceSource};

/// The downstream HTTP transport.
pub type HttpClient = Client<HttpConnector, Body>;

/// Orchestrates routing, discovery, load balancing and QoS per request.
pub struct Dispatcher {
    table: ArcSwap<RouteTable>,
    pipelines: ArcSwap<PipelineCache>,
    discovery: ArcSwap<DiscoveryConfig>,
    balancers: LoadBalancerHouse,
    registry: Arc<ProviderRegistry>,
    static_providers: DashMap<String, Arc<dyn ServiceDiscovery>>,
    discovery_providers: DashMap<String, Arc<dyn ServiceDiscovery>>,
    client: HttpClient,
}

impl Dispatcher {
    /// Build a dispatcher for a configuration generation. Registry-backed
    /// services resolve through `registry`.
    pub fn new(config: &GatewayConfig, registry: Arc<ProviderRegistry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            table: ArcSwap::from_pointee(RouteTable::build(config)),
            pipelines: ArcSwap::from_pointee(PipelineCache::new(config.global.timeout_ms)),
            discovery: ArcSwap::from_pointee(config.discovery.clone()),
            balancers: LoadBalancerHouse::with_defaults(),
            registry,
            static_providers: DashMap::new(),
            discovery_providers: DashMap::new(),
            client,
        }
    }

    /// Atomically swap in a new configuration generation. Readers never see
    /// a half-updated table; caches tied to the old generation are dropped.
    pub fn reload(&self, config: &GatewayConfig) {
        let table = RouteTable::build(config);
        tracing::info!(routes = table.len(), "Configuration reloaded, swapping route table");

        self.table.store(Arc::new(table));
        self.pipelines
            .store(Arc::new(PipelineCache::new(config.global.timeout_ms)));
        self.discovery.store(Arc::new(config.discovery.clone()));
        self.balancers.clear();
        self.static_providers.clear();
        // Dropping a polling provider aborts its refresh task.
        self.discovery_providers.clear();
    }

    /// The active route table (test and diagnostics hook).
    pub fn route_table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Handle one inbound request end to end.
    pub async fn dispatch(&self, req: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let started = Instant::now();
        let method = req.method().to_string();
        let mut route_label = String::from("none");

        let result = self.dispatch_inner(req, &mut route_label).await;

        match &result {
            Ok(response) => {
                metrics::record_request(&method, &route_label, response.status().as_u16(), started);
            }
            Err(error) => {
                metrics::record_gateway_error(error.kind());
                metrics::record_request(&method, &route_label, error.status().as_u16(), started);
            }
        }
        result
    }

    async fn dispatch_inner(
        &self,
        req: Request<Body>,
        route_label: &mut String,
    ) -> Result<Response<Body>, GatewayError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req
            .uri()
            .query()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let id = request_id(&req).to_string();

        let table = self.table.load();
        let route = table.resolve(&method, &host, &path, &query)?;
        *route_label = route.name().to_string();

        tracing::debug!(
            request_id = %id,
            route = %route.name(),
            method = %method,
            path = %path,
            "Route resolved"
        );

        let instances = self.instances(&route).await?;

        let ctx = LeaseContext::new(req.headers());
        let lease = self.balancers.lease(&route, &instances, &ctx)?;

        let downstream = build_downstream_request(req, &route, lease.host(), &path, &query)?;

        let response: Response<hyper::body::Incoming> = match self.pipelines.load().get_or_build(&route) {
            Some(pipeline) => pipeline
                .execute(self.client.request(downstream))
                .await
                .map_err(GatewayError::from)?,
            // No QoS configured: straight to the raw call.
            None => self
                .client
                .request(downstream)
                .await
                .map_err(GatewayError::Transport)?,
        };

        tracing::debug!(
            request_id = %id,
            route = %route.name(),
            host = %lease.host(),
            status = response.status().as_u16(),
            "Downstream call completed"
        );

        // `lease` drops here (and on every earlier error or cancellation),
        // releasing the connection count exactly once.
        Ok(response.map(Body::new))
    }

    /// Current candidate instances for a route.
    async fn instances(&self, route: &Arc<Route>) -> Result<Vec<ServiceInstance>, GatewayError> {
        let provider = match route.source() {
            ServiceSource::Static(hosts) => {
                let hosts = hosts.clone();
                self.static_providers
                    .entry(route.name().to_string())
                    .or_insert_with(|| {
                        Arc::new(StaticInstanceProvider::new(route.name(), hosts))
                    })
                    .value()
                    .clone()
            }
            ServiceSource::Discovery { service, namespace } => {
                let key = ProviderRegistry::service_key(service, namespace.as_deref());
                match self.discovery_providers.get(&key) {
                    Some(provider) => provider.value().clone(),
                    None => {
                        let inner = self.registry.get(&key)?;
                        let discovery = self.discovery.load();
                        let provider: Arc<dyn ServiceDiscovery> =
                            if discovery.provider == "polling" {
                                Arc::new(PollingProvider::new(
                                    inner,
                                    Duration::from_millis(discovery.polling_interval_ms),
                                ))
                            } else {
                                inner
                            };
                        self.discovery_providers.insert(key, provider.clone());
                        provider
                    }
                }
            }
        };

        Ok(provider.get_instances().await?)
    }
}

/// Rewrite the inbound request for the leased downstream host: scheme from
/// the route (or the host's own), authority from the lease, path from the
/// downstream template with placeholder values substituted, query passed
/// through.
fn build_downstream_request(
    req: Request<Body>,
    route: &Route,
    host: &crate::routing::DownstreamHostAndPort,
    path: &str,
    query: &str,
) -> Result<Request<Body>, GatewayError> {
    let values = route.template().extract_placeholders(path, query);
    let mut path_and_query = substitute_placeholders(route.downstream_path_template(), &values);
    if !query.is_empty() && !path_and_query.contains('?') {
        path_and_query.push_str(query);
    }

    let base = host
        .base_url(route.downstream_scheme())
        .map_err(|e| GatewayError::BadDownstreamRequest(e.to_string()))?;
    let target = format!("{}{}", base.as_str().trim_end_matches('/'), path_and_query);
    let uri: Uri = target
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| GatewayError::BadDownstreamRequest(e.to_string()))?;

    let (parts, body) = req.into_parts();
    let mut builder = Request::builder().method(parts.method).uri(uri);

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            // The transport derives Host from the target authority.
            if name == &header::HOST {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
    }

    builder
        .body(body)
        .map_err(|e| GatewayError::BadDownstreamRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, HostAndPortConfig, RouteConfig};
    use crate::routing::DownstreamHostAndPort;

    fn route(upstream: &str, downstream: &str) -> Route {
        let config = RouteConfig {
            upstream_path_template: upstream.into(),
            downstream_path_template: downstream.into(),
            downstream_hosts: vec![HostAndPortConfig {
                host: "10.0.0.1".into(),
                port: 8081,
                scheme: None,
            }],
            ..RouteConfig::default()
        };
        Route::build(&config, &GlobalConfig::default()).unwrap()
    }

    #[test]
    fn test_downstream_uri_substitutes_placeholders() {
        let route = route("/api/products/{id}", "/products/{id}");
        let host = DownstreamHostAndPort::new("10.0.0.1", 8081);
        let req = Request::builder()
            .method("GET")
            .uri("/api/products/42")
            .body(Body::empty())
            .unwrap();

        let downstream =
            build_downstream_request(req, &route, &host, "/api/products/42", "").unwrap();
        assert_eq!(
            downstream.uri().to_string(),
            "http://10.0.0.1:8081/products/42"
        );
    }

    #[test]
    fn test_downstream_uri_carries_query() {
        let route = route("/api/products/{id}", "/products/{id}");
        let host = DownstreamHostAndPort::new("10.0.0.1", 8081);
        let req = Request::builder()
            .uri("/api/products/42?full=true")
            .body(Body::empty())
            .unwrap();

        let downstream =
            build_downstream_request(req, &route, &host, "/api/products/42", "?full=true")
                .unwrap();
        assert_eq!(
            downstream.uri().to_string(),
            "http://10.0.0.1:8081/products/42?full=true"
        );
    }

    #[test]
    fn test_downstream_request_drops_host_header() {
        let route = route("/api/{all}", "/{all}");
        let host = DownstreamHostAndPort::new("10.0.0.1", 8081);
        let req = Request::builder()
            .uri("/api/a/b")
            .header(header::HOST, "gateway.example.com")
            .header("x-custom", "kept")
            .body(Body::empty())
            .unwrap();

        let downstream = build_downstream_request(req, &route, &host, "/api/a/b", "").unwrap();
        assert!(downstream.headers().get(header::HOST).is_none());
        assert_eq!(downstream.headers().get("x-custom").unwrap(), "kept");
        assert_eq!(downstream.uri().path(), "/a/b");
    }

    #[test]
    fn test_per_host_scheme_override() {
        let route = route("/api/{id}", "/{id}");
        let host = DownstreamHostAndPort {
            host: "10.0.0.1".into(),
            port: 8443,
            scheme: Some("https".into()),
        };
        let req = Request::builder()
            .uri("/api/9")
            .body(Body::empty())
            .unwrap();

        let downstream = build_downstream_request(req, &route, &host, "/api/9", "").unwrap();
        assert_eq!(downstream.uri().scheme_str(), Some("https"));
    }
}
