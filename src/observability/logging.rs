//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate; events carry fields, not formatted strings
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `default_level` applies to this crate
/// when `RUST_LOG` is unset.
pub fn init_logging(default_level: &str) {
    let fallback = format!("route_reloader={},tower_http=info", default_level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
