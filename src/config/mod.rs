//! Process configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ReloaderConfig (validated, immutable)
//! ```
//!
//! Route definitions are not process configuration; they arrive through
//! the `source` module or the admin API and can change at runtime.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ReloaderConfig;
