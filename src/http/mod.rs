//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, TraceLayer)
//!     → access_log.rs (method, URI, query parameters)
//!     → admin handlers
//! ```

pub mod access_log;
pub mod server;

pub use server::{AdminServer, AppState};
