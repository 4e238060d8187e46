//! Gateway error taxonomy.
//!
//! # Responsibilities
//! - One typed error per dispatch failure class
//! - Map each class to the upstream HTTP status
//!
//! # Design Decisions
//! - Runtime failures are always surfaced as a mapped gateway error, never
//!   swallowed and never retried here
//! - Timeout and open-circuit collapse into the service-unavailable class,
//!   carrying the originating failure for diagnostics

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::discovery::DiscoveryError;
use crate::load_balancer::LeaseError;
use crate::qos::PipelineError;
use crate::routing::RouteNotFound;

/// The downstream transport's error type.
pub type TransportError = hyper_util::client::legacy::Error;

/// Error type for request dispatch.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No route accepts the request.
    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),

    /// Discovery failed or knows nothing about the service.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The load balancer could not lease a host.
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// The downstream call exceeded the route's timeout.
    #[error("downstream call timed out after {0:?}")]
    DownstreamTimedOut(Duration),

    /// The route's circuit is open; no network attempt was made.
    #[error("circuit open for '{route}'")]
    CircuitOpen { route: String },

    /// Connection refused, DNS failure and friends.
    #[error("downstream transport error")]
    Transport(#[source] TransportError),

    /// The downstream request could not be constructed.
    #[error("failed to build downstream request: {0}")]
    BadDownstreamRequest(String),
}

impl GatewayError {
    /// Upstream status for this failure class.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::Discovery(_) | Self::Lease(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DownstreamTimedOut(_) | Self::CircuitOpen { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::BadDownstreamRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RouteNotFound(_) => "route_not_found",
            Self::Discovery(_) => "discovery",
            Self::Lease(_) => "lease",
            Self::DownstreamTimedOut(_) => "timeout",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Transport(_) => "transport",
            Self::BadDownstreamRequest(_) => "bad_downstream_request",
        }
    }
}

impl From<PipelineError<TransportError>> for GatewayError {
    fn from(error: PipelineError<TransportError>) -> Self {
        match error {
            PipelineError::Timeout(after) => Self::DownstreamTimedOut(after),
            PipelineError::CircuitOpen { route } => Self::CircuitOpen { route },
            PipelineError::Transport(source) => Self::Transport(source),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::RouteNotFound(_) => "No matching route found",
            Self::Discovery(_) | Self::Lease(_) => "No downstream instances available",
            Self::DownstreamTimedOut(_) | Self::CircuitOpen { .. } => {
                "Downstream service unavailable"
            }
            Self::Transport(_) | Self::BadDownstreamRequest(_) => "Upstream request failed",
        };
        (status, body).into_response()
    }
}
