//! Static instance provider.

use async_trait::async_trait;

use crate::discovery::instance::ServiceInstance;
use crate::discovery::{DiscoveryError, ServiceDiscovery};
use crate::routing::DownstreamHostAndPort;

/// Serves the hosts configured on a route as single-instance-per-host
/// snapshots. Makes no network calls and never fails.
#[derive(Debug)]
pub struct StaticInstanceProvider {
    service_name: String,
    hosts: Vec<DownstreamHostAndPort>,
}

impl StaticInstanceProvider {
    pub fn new(service_name: impl Into<String>, hosts: Vec<DownstreamHostAndPort>) -> Self {
        Self {
            service_name: service_name.into(),
            hosts,
        }
    }
}

#[async_trait]
impl ServiceDiscovery for StaticInstanceProvider {
    async fn get_instances(&self) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        Ok(self
            .hosts
            .iter()
            .map(|h| ServiceInstance::new(self.service_name.clone(), h.clone()))
            .collect())
    }
}
