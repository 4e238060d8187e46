//! Cookie-pinned sticky sessions.
//!
//! # Responsibilities
//! - Pin a cookie-identified client to a previously chosen host
//! - Delegate to an inner strategy on cache miss
//! - Expire pins on a sliding window
//!
//! # Design Decisions
//! - The store is scoped by the balancer key, so two grouped routes share
//!   pins while unrelated routes cannot collide
//! - Expired pins are purged opportunistically on access and their host is
//!   released on the inner strategy
//! - A request without the session cookie is balanced by the inner strategy
//!   and not pinned

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::discovery::ServiceInstance;
use crate::load_balancer::{LeaseContext, LeaseError, LoadBalancer};
use crate::routing::DownstreamHostAndPort;

/// Default session cookie name when a route configures none.
pub const DEFAULT_COOKIE_NAME: &str = "gateway_session";

#[derive(Debug, Clone)]
struct StickySession {
    host: DownstreamHostAndPort,
    expires_at: Instant,
}

/// Cookie-sticky strategy wrapping an inner balancer.
pub struct CookieStickySessions {
    cookie_name: String,
    expiry: Duration,
    store_prefix: String,
    inner: Arc<dyn LoadBalancer>,
    sessions: DashMap<String, StickySession>,
}

impl CookieStickySessions {
    pub fn new(
        cookie_name: impl Into<String>,
        expiry: Duration,
        store_prefix: impl Into<String>,
        inner: Arc<dyn LoadBalancer>,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            expiry,
            store_prefix: store_prefix.into(),
            inner,
            sessions: DashMap::new(),
        }
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.sessions.retain(|_, session| {
            if session.expires_at <= now {
                self.inner.release(&session.host);
                false
            } else {
                true
            }
        });
    }

    #[cfg(test)]
    fn pinned(&self, cookie: &str) -> Option<DownstreamHostAndPort> {
        self.sessions
            .get(&format!("{}:{cookie}", self.store_prefix))
            .map(|s| s.host.clone())
    }
}

impl LoadBalancer for CookieStickySessions {
    fn name(&self) -> &'static str {
        "CookieStickySessions"
    }

    fn lease(
        &self,
        instances: &[ServiceInstance],
        ctx: &LeaseContext<'_>,
    ) -> Result<DownstreamHostAndPort, LeaseError> {
        self.purge_expired();

        let Some(cookie) = ctx.cookie(&self.cookie_name) else {
            return self.inner.lease(instances, ctx);
        };

        let key = format!("{}:{cookie}", self.store_prefix);

        if let Some(mut session) = self.sessions.get_mut(&key) {
            session.expires_at = Instant::now() + self.expiry;
            return Ok(session.host.clone());
        }

        let host = self.inner.lease(instances, ctx)?;
        self.sessions.insert(
            key,
            StickySession {
                host: host.clone(),
                expires_at: Instant::now() + self.expiry,
            },
        );
        Ok(host)
    }

    // The pinned host stays claimed on the inner strategy until the session
    // expires; per-request release is deliberately a no-op.
    fn release(&self, _host: &DownstreamHostAndPort) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::round_robin::RoundRobin;
    use axum::http::header::COOKIE;
    use axum::http::{HeaderMap, HeaderValue};

    fn instances(hosts: &[&str]) -> Vec<ServiceInstance> {
        hosts
            .iter()
            .map(|h| ServiceInstance::new("svc", DownstreamHostAndPort::new(*h, 80)))
            .collect()
    }

    fn sticky(expiry: Duration) -> CookieStickySessions {
        CookieStickySessions::new(
            "session",
            expiry,
            "svc",
            Arc::new(RoundRobin::new("svc")),
        )
    }

    fn headers_with_cookie(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_same_cookie_pins_same_host() {
        let lb = sticky(Duration::from_secs(60));
        let snapshot = instances(&["a", "b", "c"]);
        let headers = headers_with_cookie("session=client1");
        let ctx = LeaseContext::new(&headers);

        let first = lb.lease(&snapshot, &ctx).unwrap();
        for _ in 0..5 {
            assert_eq!(lb.lease(&snapshot, &ctx).unwrap(), first);
        }
    }

    #[test]
    fn test_distinct_cookies_spread_over_inner_strategy() {
        let lb = sticky(Duration::from_secs(60));
        let snapshot = instances(&["a", "b"]);

        let h1 = headers_with_cookie("session=one");
        let h2 = headers_with_cookie("session=two");
        let first = lb.lease(&snapshot, &LeaseContext::new(&h1)).unwrap();
        let second = lb.lease(&snapshot, &LeaseContext::new(&h2)).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_missing_cookie_is_not_pinned() {
        let lb = sticky(Duration::from_secs(60));
        let snapshot = instances(&["a", "b"]);

        let first = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        let second = lb.lease(&snapshot, &LeaseContext::default()).unwrap();
        assert_ne!(first, second);
        assert!(lb.sessions.is_empty());
    }

    #[test]
    fn test_expired_pin_is_replaced() {
        let lb = sticky(Duration::from_millis(0));
        let snapshot = instances(&["a", "b"]);
        let headers = headers_with_cookie("session=client1");
        let ctx = LeaseContext::new(&headers);

        let first = lb.lease(&snapshot, &ctx).unwrap();
        assert_eq!(first.host, "a");

        // Zero expiry: the pin is already stale, so the inner round-robin
        // advances.
        std::thread::sleep(Duration::from_millis(5));
        let second = lb.lease(&snapshot, &ctx).unwrap();
        assert_eq!(second.host, "b");
    }

    #[test]
    fn test_hit_slides_expiry() {
        let lb = sticky(Duration::from_secs(60));
        let snapshot = instances(&["a", "b"]);
        let headers = headers_with_cookie("session=client1");
        let ctx = LeaseContext::new(&headers);

        lb.lease(&snapshot, &ctx).unwrap();
        let before = lb
            .sessions
            .get("svc:client1")
            .map(|s| s.expires_at)
            .unwrap();

        std::thread::sleep(Duration::from_millis(5));
        lb.lease(&snapshot, &ctx).unwrap();
        let after = lb
            .sessions
            .get("svc:client1")
            .map(|s| s.expires_at)
            .unwrap();

        assert!(after > before);
        assert!(lb.pinned("client1").is_some());
    }

    #[test]
    fn test_empty_list_fails_through_inner() {
        let lb = sticky(Duration::from_secs(60));
        let headers = headers_with_cookie("session=client1");
        assert!(lb.lease(&[], &LeaseContext::new(&headers)).is_err());
    }
}
