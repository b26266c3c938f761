//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_termination resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger → coordinator, file source, admin server stop → main joins
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
