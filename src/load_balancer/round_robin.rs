//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::discovery::ServiceInstance;
use crate::load_balancer::{LeaseContext, LeaseError, LoadBalancer};
use crate::routing::DownstreamHostAndPort;

/// Round-robin selector.
///
/// The counter only ever increases; the index is taken modulo the length of
/// the snapshot handed to each call, so the instance list may grow or
/// shrink between calls without resetting rotation state.
#[derive(Debug)]
pub struct RoundRobin {
    service_name: String,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            counter: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &'static str {
        "RoundRobin"
    }

    fn lease(
        &self,
        instances: &[ServiceInstance],
        _ctx: &LeaseContext<'_>,
    ) -> Result<DownstreamHostAndPort, LeaseError> {
        if instances.is_empty() {
            return Err(LeaseError::NoInstancesAvailable {
                service: self.service_name.clone(),
            });
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        Ok(instances[index].host_and_port.clone())
    }

    fn release(&self, _host: &DownstreamHostAndPort) {}
}
