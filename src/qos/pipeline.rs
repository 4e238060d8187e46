//! Per-route resilience pipelines.
//!
//! # Responsibilities
//! - Combine the timeout stage with the optional circuit breaker
//! - Cache one pipeline per route identity per configuration generation
//!
//! # Design Decisions
//! - A route with no QoS (and no global default) yields no pipeline at all;
//!   the dispatcher then calls downstream directly
//! - Server-error responses count against the breaker but are still relayed
//!   upstream unchanged
//! - The cache is a lazily-populated map; reload discards it wholesale

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::qos::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::qos::timeouts::resolve_timeout;
use crate::routing::Route;

/// Status codes the breaker counts as downstream failures.
const SERVER_ERROR_CODES: [u16; 9] = [500, 501, 502, 503, 504, 505, 506, 507, 508];

/// Error type for pipeline execution. `E` is the transport's error type.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E: std::error::Error + 'static> {
    /// The downstream call exceeded the configured timeout.
    #[error("downstream call timed out after {0:?}")]
    Timeout(Duration),

    /// The circuit is open; the call never reached the network.
    #[error("circuit open for '{route}'")]
    CircuitOpen { route: String },

    /// The transport failed (connection refused, DNS failure, ...).
    #[error("downstream transport error")]
    Transport(#[source] E),
}

/// The timeout + optional circuit-breaker wrapper around a downstream call.
#[derive(Debug)]
pub struct ResiliencePipeline {
    route: String,
    timeout: Duration,
    breaker: Option<CircuitBreaker>,
}

impl ResiliencePipeline {
    pub fn new(route: impl Into<String>, timeout: Duration, breaker: Option<CircuitBreaker>) -> Self {
        Self {
            route: route.into(),
            timeout,
            breaker,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    /// Run a downstream call through the pipeline.
    ///
    /// The breaker admission check runs first, so an open circuit
    /// short-circuits without touching the network. The call is cancelled
    /// once the timeout elapses. Outcome classification: a server-error
    /// status, transport error or timeout is a failure; everything else is
    /// a success.
    pub async fn execute<B, E, F>(
        &self,
        call: F,
    ) -> Result<axum::http::Response<B>, PipelineError<E>>
    where
        E: std::error::Error + 'static,
        F: Future<Output = Result<axum::http::Response<B>, E>>,
    {
        if let Some(breaker) = &self.breaker {
            breaker.try_acquire().map_err(|e| PipelineError::CircuitOpen {
                route: e.route,
            })?;
        }

        match tokio::time::timeout(self.timeout, call).await {
            Err(_elapsed) => {
                self.record_failure();
                Err(PipelineError::Timeout(self.timeout))
            }
            Ok(Err(transport)) => {
                self.record_failure();
                Err(PipelineError::Transport(transport))
            }
            Ok(Ok(response)) => {
                if SERVER_ERROR_CODES.contains(&response.status().as_u16()) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Ok(response)
            }
        }
    }

    fn record_failure(&self) {
        if let Some(breaker) = &self.breaker {
            breaker.record_failure();
        }
    }

    fn record_success(&self) {
        if let Some(breaker) = &self.breaker {
            breaker.record_success();
        }
    }
}

/// Lazily-built pipeline cache for one configuration generation.
pub struct PipelineCache {
    global_timeout_ms: Option<u64>,
    pipelines: DashMap<String, Option<Arc<ResiliencePipeline>>>,
}

impl PipelineCache {
    pub fn new(global_timeout_ms: Option<u64>) -> Self {
        Self {
            global_timeout_ms,
            pipelines: DashMap::new(),
        }
    }

    /// Fetch the pipeline for a route, building it on first use. `None`
    /// (cached as well) means the route has no QoS configured and the
    /// dispatcher must skip straight to the raw call.
    pub fn get_or_build(&self, route: &Route) -> Option<Arc<ResiliencePipeline>> {
        self.pipelines
            .entry(route.name().to_string())
            .or_insert_with(|| self.build(route))
            .clone()
    }

    /// Discard every pipeline; called on configuration reload.
    pub fn clear(&self) {
        self.pipelines.clear();
    }

    fn build(&self, route: &Route) -> Option<Arc<ResiliencePipeline>> {
        let qos = route.qos();
        if qos.is_none() && self.global_timeout_ms.is_none() {
            return None;
        }

        let timeout = resolve_timeout(qos.and_then(|q| q.timeout_ms), self.global_timeout_ms);
        let breaker = qos
            .and_then(BreakerSettings::from_qos)
            .map(|settings| CircuitBreaker::new(route.name(), settings));

        tracing::debug!(
            route = %route.name(),
            timeout_ms = timeout.as_millis() as u64,
            breaker = breaker.is_some(),
            "Resilience pipeline built"
        );
        Some(Arc::new(ResiliencePipeline::new(route.name(), timeout, breaker)))
    }
}
