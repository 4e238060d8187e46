//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, host, path, query)
//!     → table.rs (candidate scan, priority selection)
//!     → template.rs (compiled pattern evaluation)
//!     → Return: matched Route or RouteNotFound
//!
//! Route Compilation (at startup/reload):
//!     RouteConfig[]
//!     → template.rs (compile patterns, assign priorities)
//!     → route.rs (freeze immutable Routes)
//!     → RouteTable published atomically
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Bounded templates (priority 1) beat catch-alls (priority 0); remaining
//!   ties go to the earliest-configured route
//! - Deterministic: same table and request always yield the same route

pub mod route;
pub mod table;
pub mod template;

pub use route::{DownstreamHostAndPort, Route, ServiceSource};
pub use table::{RouteNotFound, RouteTable};
pub use template::{CompiledTemplate, PlaceholderValue};
