//! Reload subsystem.
//!
//! # Data Flow
//! ```text
//! Transport adapter (file source, admin API, embedding code)
//!     → ReloadHandle::submit (FIFO queue)
//!     → coordinator.rs: reduce → mutate store → compile → publish
//!     → table.rs: ArcSwap generation swap + RoutesRefreshed broadcast
//!
//! Request path:
//!     RouteTable::current() → RouteTableGeneration::match_request
//! ```
//!
//! # Design Decisions
//! - Readers never wait on a reload in progress
//! - A failed reload leaves the previous generation serving

pub mod coordinator;
pub mod state;
pub mod table;

pub use coordinator::{
    ChangeConsumer, ReloadCoordinator, ReloadError, ReloadHandle, ReloadOutcome, ReloadSettings,
};
pub use state::ReloadState;
pub use table::{ReloadFailure, RouteTable, RoutesRefreshed};
