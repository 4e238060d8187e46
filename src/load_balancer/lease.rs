//! Per-host connection leases.
//!
//! # Responsibilities
//! - Track in-flight connection counts per downstream host
//! - Keep the tracked host set in step with the latest discovery snapshot
//!
//! # Design Decisions
//! - One coarse lock per table; acquire and release for the same host are
//!   linearized through it
//! - Hosts missing from a fresh snapshot are purged on sync, but an
//!   in-flight release for a purged host is a quiet no-op
//! - Counts never go negative

use std::sync::Mutex;

use crate::discovery::ServiceInstance;
use crate::routing::DownstreamHostAndPort;

/// A host paired with its in-flight connection count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub host_and_port: DownstreamHostAndPort,
    pub connections: u32,
}

/// Connection-lease bookkeeping for one balancer instance.
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: Mutex<Vec<Lease>>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync the table to the snapshot, then claim the host with the fewest
    /// in-flight connections. The increment happens inside the same critical
    /// section, so two concurrent callers can never both see the same
    /// minimum and pick the same count.
    ///
    /// Ties go to the host seen earliest.
    pub fn acquire_least_connected(
        &self,
        instances: &[ServiceInstance],
    ) -> Option<DownstreamHostAndPort> {
        let mut leases = self.lock();
        sync_to_snapshot(&mut leases, instances);

        let mut winner: Option<usize> = None;
        for (i, lease) in leases.iter().enumerate() {
            match winner {
                Some(w) if leases[w].connections <= lease.connections => {}
                _ => winner = Some(i),
            }
        }

        let idx = winner?;
        leases[idx].connections += 1;
        Some(leases[idx].host_and_port.clone())
    }

    /// Decrement the count for a host. Unknown hosts (purged after a
    /// snapshot refresh) are ignored; counts saturate at zero.
    pub fn release(&self, host: &DownstreamHostAndPort) {
        let mut leases = self.lock();
        if let Some(lease) = leases.iter_mut().find(|l| &l.host_and_port == host) {
            lease.connections = lease.connections.saturating_sub(1);
        }
    }

    /// Current count for a host, if tracked.
    pub fn connections(&self, host: &DownstreamHostAndPort) -> Option<u32> {
        self.lock()
            .iter()
            .find(|l| &l.host_and_port == host)
            .map(|l| l.connections)
    }

    /// Number of tracked hosts.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Lease>> {
        self.leases.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Purge leases for vanished hosts, add unseen hosts at zero. Preserves
/// first-seen order for the survivors.
fn sync_to_snapshot(leases: &mut Vec<Lease>, instances: &[ServiceInstance]) {
    leases.retain(|lease| {
        instances
            .iter()
            .any(|i| i.host_and_port == lease.host_and_port)
    });

    for instance in instances {
        if !leases.iter().any(|l| l.host_and_port == instance.host_and_port) {
            leases.push(Lease {
                host_and_port: instance.host_and_port.clone(),
                connections: 0,
            });
        }
    }
}
