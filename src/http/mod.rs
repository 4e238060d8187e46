//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace layer)
//!     → dispatcher.rs (resolve route → discover → lease → QoS → forward)
//!     → error.rs (failure classes mapped to upstream statuses)
//!     → Response to client
//! ```

pub mod dispatcher;
pub mod error;
pub mod request;
pub mod server;

pub use dispatcher::Dispatcher;
pub use error::GatewayError;
pub use request::{RequestIdLayer, X_REQUEST_ID};
pub use server::GatewayServer;
