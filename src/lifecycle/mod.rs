//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/Ctrl+C → shutdown.rs broadcast
//!
//! Shutdown (shutdown.rs):
//!     Signal received → server stops accepting → in-flight drains → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
