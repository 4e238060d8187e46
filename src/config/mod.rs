//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → route table / balancer house / pipeline cache built from it
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → dispatcher swaps the route table atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults to allow minimal configs
//! - Out-of-range QoS values pass validation and are clamped at build time

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DiscoveryConfig, GatewayConfig, GlobalConfig, HostAndPortConfig, ListenerConfig,
    LoadBalancerOptions, ObservabilityConfig, QosOptions, RouteConfig,
};
pub use watcher::ConfigWatcher;
