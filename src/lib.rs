//! API-gateway core: request routing and load-balanced dispatch.
//!
//! An inbound request flows through four tightly-coupled pieces:
//!
//! ```text
//!  Client ──▶ http::server ──▶ routing (template match, priority)
//!                                  │
//!                                  ▼
//!                            discovery (static hosts or registry snapshot)
//!                                  │
//!                                  ▼
//!                            load_balancer (lease one host, RAII release)
//!                                  │
//!                                  ▼
//!                            qos (timeout + circuit breaker pipeline)
//!                                  │
//!                                  ▼
//!  Client ◀── http::error ◀── downstream transport
//! ```
//!
//! Configuration flows the other way at startup and on reload: parsed
//! route definitions populate the route table and seed each route's
//! balancer and QoS settings. Reload swaps the table atomically and drops
//! the caches of the previous generation.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Traffic management
pub mod discovery;
pub mod load_balancer;
pub mod qos;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::{Dispatcher, GatewayError, GatewayServer};
pub use lifecycle::Shutdown;
