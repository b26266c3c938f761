//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Reload (coordinator):
//!     store.rs (slot-indexed RouteDefinitions + default filters)
//!     → snapshot
//!     → compiler.rs (validate, compile predicates, order, index)
//!     → generation.rs (immutable RouteTableGeneration)
//!
//! Incoming request (external dispatcher):
//!     → generation.rs (route lookup via path index)
//!     → matcher.rs (evaluate predicates)
//!     → Return: matched RouteDefinition or None
//! ```
//!
//! # Design Decisions
//! - Generations are compiled off the request path, immutable at runtime
//! - Deterministic: same snapshot always matches the same way
//! - First match wins (ordered by `order`, then config slot)

pub mod compiler;
pub mod definition;
pub mod error;
pub mod generation;
pub mod matcher;
pub mod store;

pub use definition::{FilterDefinition, PredicateDefinition, RouteDefinition};
pub use error::{CompileError, StoreError, ValidationError};
pub use generation::RouteTableGeneration;
pub use store::{ListPositions, RouteStore, StoreSnapshot};
