//! Configuration change events.
//!
//! # Data Flow
//! ```text
//! Transport adapter (file source, admin push)
//!     → change.rs (ChangeEvent / ChangeBatch)
//!     → key.rs (parse `routes[n].field` / `default-filters[m]`)
//!     → reducer.rs (group by route, classify, fold)
//!     → Reduction (FullClear | Partial { upserts, removals })
//! ```
//!
//! # Design Decisions
//! - Keys outside the route shapes are skipped, never errors
//! - One batch is reduced as a unit against one store snapshot

pub mod change;
pub mod key;
pub mod reducer;

pub use change::{ChangeBatch, ChangeEvent, ChangeKind};
pub use key::{EventKey, KeyError, KeyPattern, RouteField};
pub use reducer::{Reducer, Reduction, Removal, Upsert, Verdict};
