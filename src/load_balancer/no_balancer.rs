//! Pass-through strategy: always the first instance.

use crate::discovery::ServiceInstance;
use crate::load_balancer::{LeaseContext, LeaseError, LoadBalancer};
use crate::routing::DownstreamHostAndPort;

/// Used for single-host routes and as the fallback for unknown strategy
/// names. No connection accounting.
#[derive(Debug)]
pub struct NoLoadBalancer {
    service_name: String,
}

impl NoLoadBalancer {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl LoadBalancer for NoLoadBalancer {
    fn name(&self) -> &'static str {
        "NoLoadBalancer"
    }

    fn lease(
        &self,
        instances: &[ServiceInstance],
        _ctx: &LeaseContext<'_>,
    ) -> Result<DownstreamHostAndPort, LeaseError> {
        instances
            .first()
            .map(|i| i.host_and_port.clone())
            .ok_or_else(|| LeaseError::NoInstancesAvailable {
                service: self.service_name.clone(),
            })
    }

    fn release(&self, _host: &DownstreamHostAndPort) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_first_instance() {
        let lb = NoLoadBalancer::new("svc");
        let instances = vec![
            ServiceInstance::new("svc", DownstreamHostAndPort::new("a", 80)),
            ServiceInstance::new("svc", DownstreamHostAndPort::new("b", 80)),
        ];

        for _ in 0..3 {
            let host = lb.lease(&instances, &LeaseContext::default()).unwrap();
            assert_eq!(host.host, "a");
        }
    }

    #[test]
    fn test_empty_list_fails() {
        let lb = NoLoadBalancer::new("svc");
        assert!(matches!(
            lb.lease(&[], &LeaseContext::default()),
            Err(LeaseError::NoInstancesAvailable { .. })
        ));
    }
}
