//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route resolved → balancer key (explicit group or route name)
//!     → house.rs (find or create the strategy instance for that key)
//!     → Apply strategy:
//!         - no_balancer.rs (always the first instance)
//!         - round_robin.rs (rotate through instances)
//!         - least_conn.rs (fewest in-flight connections, lease.rs table)
//!         - sticky.rs (cookie-pinned host, inner strategy on miss)
//!     → LeaseHandle (releases the lease exactly once on drop)
//! ```
//!
//! # Design Decisions
//! - Strategies are selected by configuration name through a registry
//!   factory; unknown names fall back to NoLoadBalancer with a warning
//! - Grouped routes share one balancer instance, so their lease table is
//!   keyed by (group, host) rather than (route, host)
//! - Release happens through an RAII guard so a downstream failure or
//!   cancellation can never leak a stuck lease

pub mod house;
pub mod lease;
pub mod least_conn;
pub mod no_balancer;
pub mod round_robin;
pub mod sticky;

use std::sync::Arc;

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

use crate::discovery::ServiceInstance;
use crate::routing::DownstreamHostAndPort;

pub use house::{LoadBalancerFactory, LoadBalancerHouse};
pub use lease::{Lease, LeaseTable};
pub use least_conn::LeastConnection;
pub use no_balancer::NoLoadBalancer;
pub use round_robin::RoundRobin;
pub use sticky::CookieStickySessions;

/// Error type for lease acquisition.
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// The candidate instance list was empty.
    #[error("no downstream instances available for '{service}'")]
    NoInstancesAvailable { service: String },

    /// Strategy-specific failure.
    #[error("lease failed for '{service}': {reason}")]
    Failed { service: String, reason: String },
}

/// Request-scoped inputs a strategy may consult when leasing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeaseContext<'a> {
    headers: Option<&'a HeaderMap>,
}

impl<'a> LeaseContext<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self {
            headers: Some(headers),
        }
    }

    /// Value of the named cookie on the inbound request, if any.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let headers = self.headers?;
        for value in headers.get_all(COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for pair in raw.split(';') {
                let mut parts = pair.trim().splitn(2, '=');
                if parts.next() == Some(name) {
                    return parts.next().map(str::to_string);
                }
            }
        }
        None
    }
}

/// A load-balancing strategy.
///
/// `lease` claims one host from the supplied snapshot; every successful
/// lease is paired with exactly one `release`, performed by the
/// [`LeaseHandle`] guard.
pub trait LoadBalancer: Send + Sync {
    /// Strategy name as it appears in configuration.
    fn name(&self) -> &'static str;

    /// Claim one host for the duration of a request.
    fn lease(
        &self,
        instances: &[ServiceInstance],
        ctx: &LeaseContext<'_>,
    ) -> Result<DownstreamHostAndPort, LeaseError>;

    /// Return a previously leased host. Must tolerate hosts that have since
    /// vanished from discovery.
    fn release(&self, host: &DownstreamHostAndPort);
}

/// RAII guard over a leased host; releases on drop, in every exit path.
pub struct LeaseHandle {
    balancer: Arc<dyn LoadBalancer>,
    host: DownstreamHostAndPort,
}

impl LeaseHandle {
    pub fn new(balancer: Arc<dyn LoadBalancer>, host: DownstreamHostAndPort) -> Self {
        Self { balancer, host }
    }

    pub fn host(&self) -> &DownstreamHostAndPort {
        &self.host
    }
}

impl Drop for LeaseHandle {
    fn drop(&mut self) {
        self.balancer.release(&self.host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=en"),
        );
        let ctx = LeaseContext::new(&headers);

        assert_eq!(ctx.cookie("session").as_deref(), Some("abc123"));
        assert_eq!(ctx.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(ctx.cookie("missing"), None);
    }

    #[test]
    fn test_empty_context_has_no_cookies() {
        let ctx = LeaseContext::default();
        assert_eq!(ctx.cookie("session"), None);
    }
}
