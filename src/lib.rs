//! Live-reloadable route table for an HTTP gateway.
//!
//! Configuration-change batches flow through a single reload coordinator
//! that maintains a working set of route definitions and publishes
//! immutable, compiled route tables. Request handling reads the current
//! table without ever waiting on a reload.

pub mod admin;
pub mod config;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reload;
pub mod routing;
pub mod source;

pub use config::ReloaderConfig;
pub use events::{ChangeBatch, ChangeEvent, ChangeKind};
pub use lifecycle::Shutdown;
pub use reload::{ChangeConsumer, ReloadCoordinator, ReloadHandle, ReloadOutcome, RouteTable};
pub use routing::{RouteDefinition, RouteTableGeneration};
