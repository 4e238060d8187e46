//! Strategy factory and balancer instance cache.
//!
//! # Responsibilities
//! - Map configured strategy names to constructors
//! - Own one balancer instance per balancer key (route or explicit group)
//!
//! # Design Decisions
//! - Unknown strategy names fall back to NoLoadBalancer with a warning;
//!   configuration never takes a route out of service
//! - A key whose configured strategy changed on reload gets a fresh
//!   instance; otherwise rotation and lease state survive
//! - The cache is cleared wholesale when a new configuration generation is
//!   published

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::discovery::ServiceInstance;
use crate::load_balancer::sticky::DEFAULT_COOKIE_NAME;
use crate::load_balancer::{
    CookieStickySessions, LeaseContext, LeaseError, LeaseHandle, LeastConnection, LoadBalancer,
    NoLoadBalancer, RoundRobin,
};
use crate::routing::Route;

type Constructor = fn(&Route) -> Arc<dyn LoadBalancer>;

/// Registry-pattern factory: strategy name -> constructor.
pub struct LoadBalancerFactory {
    registry: HashMap<&'static str, Constructor>,
}

impl LoadBalancerFactory {
    /// Factory with the four built-in strategies registered.
    pub fn with_defaults() -> Self {
        let mut factory = Self {
            registry: HashMap::new(),
        };
        factory.register("NoLoadBalancer", |route| {
            Arc::new(NoLoadBalancer::new(route.name()))
        });
        factory.register("RoundRobin", |route| {
            Arc::new(RoundRobin::new(route.name()))
        });
        factory.register("LeastConnection", |route| {
            Arc::new(LeastConnection::new(route.name()))
        });
        factory.register("CookieStickySessions", |route| {
            let settings = route.load_balancer();
            let cookie = settings
                .cookie_name
                .clone()
                .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
            Arc::new(CookieStickySessions::new(
                cookie,
                settings.expiry,
                route.balancer_key(),
                Arc::new(RoundRobin::new(route.name())),
            ))
        });
        factory
    }

    /// Register (or replace) a strategy constructor.
    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        self.registry.insert(name, constructor);
    }

    /// Canonical strategy name for a route: the configured name when known,
    /// otherwise the fallback.
    pub fn canonical_strategy(&self, configured: &str) -> &'static str {
        self.registry
            .get_key_value(configured)
            .map(|(name, _)| *name)
            .unwrap_or("NoLoadBalancer")
    }

    /// Build the balancer for a route.
    pub fn create(&self, route: &Route) -> Arc<dyn LoadBalancer> {
        let configured = &route.load_balancer().strategy;
        match self.registry.get(configured.as_str()) {
            Some(constructor) => constructor(route),
            None => {
                tracing::warn!(
                    strategy = %configured,
                    route = %route.name(),
                    "Unknown load-balancer strategy, falling back to NoLoadBalancer"
                );
                Arc::new(NoLoadBalancer::new(route.name()))
            }
        }
    }
}

impl Default for LoadBalancerFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Owns the balancer instances of one configuration generation.
pub struct LoadBalancerHouse {
    factory: LoadBalancerFactory,
    balancers: DashMap<String, Arc<dyn LoadBalancer>>,
}

impl LoadBalancerHouse {
    pub fn new(factory: LoadBalancerFactory) -> Self {
        Self {
            factory,
            balancers: DashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LoadBalancerFactory::with_defaults())
    }

    /// Find or create the balancer instance for a route's key.
    pub fn get(&self, route: &Route) -> Arc<dyn LoadBalancer> {
        let key = route.balancer_key();
        let canonical = self.factory.canonical_strategy(&route.load_balancer().strategy);

        let mut entry = self
            .balancers
            .entry(key)
            .or_insert_with(|| self.factory.create(route));
        if entry.name() != canonical {
            *entry = self.factory.create(route);
        }
        entry.value().clone()
    }

    /// Lease one host for a request. The returned handle releases the lease
    /// exactly once when dropped.
    pub fn lease(
        &self,
        route: &Route,
        instances: &[ServiceInstance],
        ctx: &LeaseContext<'_>,
    ) -> Result<LeaseHandle, LeaseError> {
        let balancer = self.get(route);
        let host = balancer.lease(instances, ctx)?;
        Ok(LeaseHandle::new(balancer, host))
    }

    /// Drop every balancer instance; called on configuration reload.
    pub fn clear(&self) {
        self.balancers.clear();
    }
}

impl Default for LoadBalancerHouse {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, HostAndPortConfig, LoadBalancerOptions, RouteConfig};
    use crate::routing::DownstreamHostAndPort;

    fn route(template: &str, strategy: &str, group: Option<&str>) -> Route {
        let config = RouteConfig {
            upstream_path_template: template.to_string(),
            downstream_hosts: vec![HostAndPortConfig {
                host: "127.0.0.1".into(),
                port: 8081,
                scheme: None,
            }],
            load_balancer: LoadBalancerOptions {
                strategy: strategy.to_string(),
                group: group.map(str::to_string),
                ..LoadBalancerOptions::default()
            },
            ..RouteConfig::default()
        };
        Route::build(&config, &GlobalConfig::default()).unwrap()
    }

    fn instances(hosts: &[&str]) -> Vec<ServiceInstance> {
        hosts
            .iter()
            .map(|h| ServiceInstance::new("svc", DownstreamHostAndPort::new(*h, 80)))
            .collect()
    }

    #[test]
    fn test_same_route_reuses_one_instance() {
        let house = LoadBalancerHouse::with_defaults();
        let route = route("/api/{id}", "RoundRobin", None);
        let snapshot = instances(&["a", "b"]);

        // Rotation state survives across calls: one shared counter.
        let first = house
            .lease(&route, &snapshot, &LeaseContext::default())
            .unwrap();
        let second = house
            .lease(&route, &snapshot, &LeaseContext::default())
            .unwrap();
        assert_eq!(first.host().host, "a");
        assert_eq!(second.host().host, "b");
    }

    #[test]
    fn test_grouped_routes_share_an_instance() {
        let house = LoadBalancerHouse::with_defaults();
        let one = route("/a/{id}", "RoundRobin", Some("shared"));
        let two = route("/b/{id}", "RoundRobin", Some("shared"));
        let snapshot = instances(&["a", "b"]);

        let first = house
            .lease(&one, &snapshot, &LeaseContext::default())
            .unwrap();
        let second = house
            .lease(&two, &snapshot, &LeaseContext::default())
            .unwrap();
        assert_eq!(first.host().host, "a");
        assert_eq!(second.host().host, "b");
    }

    #[test]
    fn test_unknown_strategy_falls_back() {
        let house = LoadBalancerHouse::with_defaults();
        let route = route("/api/{id}", "WeightedMagic", None);
        let snapshot = instances(&["a", "b"]);

        for _ in 0..3 {
            let handle = house
                .lease(&route, &snapshot, &LeaseContext::default())
                .unwrap();
            assert_eq!(handle.host().host, "a");
        }
    }

    #[test]
    fn test_strategy_change_recreates_instance() {
        let house = LoadBalancerHouse::with_defaults();
        let snapshot = instances(&["a", "b"]);

        let rr = route("/api/{id}", "RoundRobin", None);
        assert_eq!(house.get(&rr).name(), "RoundRobin");

        let lc = route("/api/{id}", "LeastConnection", None);
        assert_eq!(house.get(&lc).name(), "LeastConnection");
    }

    #[test]
    fn test_handle_drop_releases_lease() {
        let house = LoadBalancerHouse::with_defaults();
        let route = route("/api/{id}", "LeastConnection", None);
        let snapshot = instances(&["a", "b"]);

        let first = house
            .lease(&route, &snapshot, &LeaseContext::default())
            .unwrap();
        assert_eq!(first.host().host, "a");
        drop(first);

        // a was released, so it is back at the minimum.
        let next = house
            .lease(&route, &snapshot, &LeaseContext::default())
            .unwrap();
        assert_eq!(next.host().host, "a");
    }

    #[test]
    fn test_clear_resets_generation() {
        let house = LoadBalancerHouse::with_defaults();
        let route = route("/api/{id}", "RoundRobin", None);
        let snapshot = instances(&["a", "b"]);

        let _ = house.lease(&route, &snapshot, &LeaseContext::default());
        house.clear();

        // Fresh counter after reload.
        let first = house
            .lease(&route, &snapshot, &LeaseContext::default())
            .unwrap();
        assert_eq!(first.host().host, "a");
    }

    #[test]
    fn test_empty_snapshot_maps_to_no_instances() {
        let house = LoadBalancerHouse::with_defaults();
        let route = route("/api/{id}", "RoundRobin", None);
        assert!(matches!(
            house.lease(&route, &[], &LeaseContext::default()),
            Err(LeaseError::NoInstancesAvailable { .. })
        ));
    }
}
