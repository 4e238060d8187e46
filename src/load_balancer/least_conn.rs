//! Least-connections load balancing strategy.

use crate::discovery::ServiceInstance;
use crate::load_balancer::lease::LeaseTable;
use crate::load_balancer::{LeaseContext, LeaseError, LoadBalancer};
use crate::routing::DownstreamHostAndPort;

/// Selects the host with the fewest in-flight connections.
///
/// Selection and increment happen inside the lease table's critical
/// section, so concurrent requests cannot both claim the same minimum.
#[derive(Debug, Default)]
pub struct LeastConnection {
    service_name: String,
    table: LeaseTable,
}

impl LeastConnection {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            table: LeaseTable::new(),
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> &LeaseTable {
        &self.table
    }
}

impl LoadBalancer for LeastConnection {
    fn name(&self) -> &'static str {
        "LeastConnection"
    }

    fn lease(
        &self,
        instances: &[ServiceInstance],
        _ctx: &LeaseContext<'_>,
    ) -> Result<DownstreamHostAndPort, LeaseError> {
        self.table
            .acquire_least_connected(instances)
            .ok_or_else(|| LeaseError::NoInstancesAvailable {
                service: self.service_name.clone(),
            })
    }

    fn release(&self, host: &DownstreamHostAndPort) {
        self.table.release(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(hosts: &[&str]) -> Vec<ServiceInstance> {
        hosts
            .iter()
            .map(|h| ServiceInstance::new("svc", DownstreamHostAndPort::new(*h, 80)))
            .collect()
    }

    #[test]
    fn test_never_selects_above_minimum() {
        let lb = LeastConnection::new("svc");
        let snapshot = instances(&["a", "b", "c"]);

        // Claim a and b without releasing.
        let first = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        let second = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        assert_eq!(first.host, "a");
        assert_eq!(second.host, "b");

        // c is the only host at zero.
        let third = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        assert_eq!(third.host, "c");
    }

    #[test]
    fn test_release_restores_preference() {
        let lb = LeastConnection::new("svc");
        let snapshot = instances(&["a", "b"]);

        let a = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        let _b = lb.lease(&snapshot, &LeaseContext::default()).unwrap();

        lb.release(&a);
        let next = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        assert_eq!(next.host, "a");
    }

    #[test]
    fn test_empty_list_fails() {
        let lb = LeastConnection::new("svc");
        assert!(matches!(
            lb.lease(&[], &LeaseContext::default()),
            Err(LeaseError::NoInstancesAvailable { .. })
        ));
    }
}
