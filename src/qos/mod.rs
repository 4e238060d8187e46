//! Quality-of-service subsystem.
//!
//! # Data Flow
//! ```text
//! Request dispatch:
//!     → pipeline.rs (fetch or lazily build the route's pipeline)
//!     → circuit_breaker.rs (admission check; open circuits refuse here)
//!     → timeouts.rs bounds (tokio timeout around the downstream call)
//!     → outcome recorded back into the breaker window
//! ```
//!
//! # Design Decisions
//! - Every downstream call through a pipeline has a deadline
//! - Configuration is clamped, never rejected: a bad QoS field falls back
//!   to a documented default instead of disabling the route
//! - Pipelines are keyed by route identity and rebuilt only on reload

pub mod circuit_breaker;
pub mod pipeline;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitOpenError};
pub use pipeline::{PipelineCache, PipelineError, ResiliencePipeline};
pub use timeouts::{resolve_timeout, DEFAULT_TIMEOUT_MS};
