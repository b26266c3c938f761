//! File-backed change source.
//!
//! # Data Flow
//! ```text
//! routes.toml edited
//!     → watcher.rs (notify event)
//!     → file.rs (parse, flatten to dotted keys)
//!     → diff.rs (ADDED / MODIFIED / DELETED against previous keys)
//!     → ChangeConsumer::submit(batch)
//! ```
//!
//! Deleting every route from the file produces a batch that deletes every
//! route key, which the reducer recognises as a full clear.

pub mod diff;
pub mod file;
pub mod watcher;

pub use file::{RouteFile, SourceError};
pub use watcher::FileSource;
