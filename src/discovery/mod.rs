//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Route resolved → ServiceSource
//!     Static hosts  → static_list.rs (echo configured hosts, no I/O)
//!     Service name  → registered provider (polling.rs wraps registry-backed
//!                     providers so refreshes run off the request path)
//!     → Vec<ServiceInstance> snapshot → load balancer
//! ```
//!
//! # Design Decisions
//! - Concrete registry wire clients live outside this crate; they plug in
//!   through the ServiceDiscovery trait and the provider registry
//! - Discovery failures surface as typed errors, never panics, and callers
//!   that cache treat them as "no change"
//! - An empty snapshot is not an error here; the dispatcher maps it to a
//!   service-unavailable outcome

pub mod instance;
pub mod polling;
pub mod static_list;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

pub use instance::ServiceInstance;
pub use polling::PollingProvider;
pub use static_list::StaticInstanceProvider;

/// Error type for discovery lookups.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    /// The registry could not be reached or returned garbage.
    #[error("discovery lookup failed for service '{service}': {reason}")]
    LookupFailed { service: String, reason: String },

    /// No provider is registered for the requested service.
    #[error("no discovery provider registered for service '{service}'")]
    UnknownService { service: String },
}

/// Supplies the current live instance list for one service.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Return the current instance snapshot. May suspend for providers that
    /// hit the network; must honor caller cancellation.
    async fn get_instances(&self) -> Result<Vec<ServiceInstance>, DiscoveryError>;
}

/// Maps service names to their discovery providers.
///
/// External collaborators register concrete providers here; the dispatcher
/// only ever sees the trait.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn ServiceDiscovery>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the provider for a service key.
    pub fn register(&self, service: impl Into<String>, provider: Arc<dyn ServiceDiscovery>) {
        self.providers.insert(service.into(), provider);
    }

    /// Look up the provider for a service key.
    pub fn get(&self, service: &str) -> Result<Arc<dyn ServiceDiscovery>, DiscoveryError> {
        self.providers
            .get(service)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DiscoveryError::UnknownService {
                service: service.to_string(),
            })
    }

    /// Build the lookup key for a service and optional namespace.
    pub fn service_key(service: &str, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}/{service}"),
            _ => service.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::DownstreamHostAndPort;

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = ProviderRegistry::new();
        registry.register(
            "orders",
            Arc::new(StaticInstanceProvider::new(
                "orders",
                vec![DownstreamHostAndPort::new("10.0.0.1", 80)],
            )),
        );

        let provider = registry.get("orders").unwrap();
        assert_eq!(provider.get_instances().await.unwrap().len(), 1);

        assert!(matches!(
            registry.get("missing"),
            Err(DiscoveryError::UnknownService { .. })
        ));
    }

    #[test]
    fn test_service_key_namespacing() {
        assert_eq!(ProviderRegistry::service_key("orders", None), "orders");
        assert_eq!(
            ProviderRegistry::service_key("orders", Some("prod")),
            "prod/orders"
        );
        assert_eq!(ProviderRegistry::service_key("orders", Some("")), "orders");
    }
}
