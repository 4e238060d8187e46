//! Polling snapshot provider.
//!
//! # Responsibilities
//! - Refresh the instance list on a timer, off the request path
//! - Hand the dispatcher the latest cached snapshot without blocking
//!
//! # Design Decisions
//! - Snapshots are immutable and published through an atomic slot; a slow
//!   registry can never stall a request
//! - A failed refresh keeps the previous snapshot (logged at warn)
//! - Dropping the provider aborts the refresh task

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::discovery::instance::ServiceInstance;
use crate::discovery::{DiscoveryError, ServiceDiscovery};

/// Wraps an inner provider with timer-driven snapshot caching.
pub struct PollingProvider {
    snapshot: Arc<ArcSwap<Vec<ServiceInstance>>>,
    task: JoinHandle<()>,
}

impl PollingProvider {
    /// Spawn the refresh task. The first refresh happens immediately so the
    /// slot is warm before the first request in the common case.
    pub fn new(inner: Arc<dyn ServiceDiscovery>, interval: Duration) -> Self {
        let snapshot = Arc::new(ArcSwap::from_pointee(Vec::new()));
        let slot = snapshot.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match inner.get_instances().await {
                    Ok(instances) => {
                        tracing::debug!(count = instances.len(), "Discovery snapshot refreshed");
                        slot.store(Arc::new(instances));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Discovery refresh failed, keeping previous snapshot");
                    }
                }
            }
        });

        Self { snapshot, task }
    }
}

#[async_trait]
impl ServiceDiscovery for PollingProvider {
    async fn get_instances(&self) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        Ok(self.snapshot.load().as_ref().clone())
    }
}

impl Drop for PollingProvider {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::DownstreamHostAndPort;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ServiceDiscovery for CountingProvider {
        async fn get_instances(&self) -> Result<Vec<ServiceInstance>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ServiceInstance::new(
                "svc",
                DownstreamHostAndPort::new("10.0.0.1", 80),
            )])
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ServiceDiscovery for FailingProvider {
        async fn get_instances(&self) -> Result<Vec<ServiceInstance>, DiscoveryError> {
            Err(DiscoveryError::LookupFailed {
                service: "svc".into(),
                reason: "registry unreachable".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_snapshot_served_without_hitting_inner_provider() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let provider = PollingProvider::new(inner.clone(), Duration::from_secs(60));

        // Give the immediate first tick a chance to land.
        tokio::time::sleep(Duration::from_millis(50)).await;

        for _ in 0..5 {
            let instances = provider.get_instances().await.unwrap();
            assert_eq!(instances.len(), 1);
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let provider = PollingProvider::new(Arc::new(FailingProvider), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Never refreshed successfully: the initial empty snapshot stands,
        // and get_instances still does not error.
        assert!(provider.get_instances().await.unwrap().is_empty());
    }
}
