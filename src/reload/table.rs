//! The published route table.
//!
//! Readers load the current generation without locking; the coordinator is
//! the only writer and replaces the whole generation in one pointer swap.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::reload::state::{ReloadState, StateCell};
use crate::routing::{CompileError, RouteTableGeneration};

/// Emitted after every successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutesRefreshed {
    pub generation: u64,
    pub revision: u64,
    pub route_count: usize,
    pub batch_id: Uuid,
}

/// The most recent reload that did not publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadFailure {
    pub batch_id: Uuid,
    /// Generation that kept serving.
    pub generation: u64,
    pub error: String,
    /// One line per validation error.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    /// Seconds since the epoch.
    pub failed_at: u64,
}

/// Shared handle to the latest published generation.
#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<RouteTableGeneration>,
    refreshed: broadcast::Sender<RoutesRefreshed>,
    state: StateCell,
    last_failure: ArcSwapOption<ReloadFailure>,
}

impl RouteTable {
    /// A table serving the empty generation 0.
    pub fn new() -> Self {
        let (refreshed, _) = broadcast::channel(64);
        Self {
            current: ArcSwap::from_pointee(RouteTableGeneration::empty()),
            refreshed,
            state: StateCell::default(),
            last_failure: ArcSwapOption::empty(),
        }
    }

    /// The latest published generation. Never blocks.
    pub fn current(&self) -> Arc<RouteTableGeneration> {
        self.current.load_full()
    }

    /// Subscribe to publish notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RoutesRefreshed> {
        self.refreshed.subscribe()
    }

    pub fn state(&self) -> ReloadState {
        self.state.get()
    }

    /// The last failed reload, kept until the next failure replaces it.
    pub fn last_failure(&self) -> Option<Arc<ReloadFailure>> {
        self.last_failure.load_full()
    }

    pub(crate) fn record_failure(&self, batch_id: Uuid, error: &CompileError) -> Arc<ReloadFailure> {
        let failed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let failure = Arc::new(ReloadFailure {
            batch_id,
            generation: self.current().number(),
            error: error.to_string(),
            details: error.validation_errors().iter().map(ToString::to_string).collect(),
            failed_at,
        });
        self.last_failure.store(Some(failure.clone()));
        failure
    }

    pub(crate) fn set_state(&self, state: ReloadState) {
        self.state.set(state);
    }

    pub(crate) fn publish(&self, generation: RouteTableGeneration, batch_id: Uuid) -> RoutesRefreshed {
        let event = RoutesRefreshed {
            generation: generation.number(),
            revision: generation.revision(),
            route_count: generation.len(),
            batch_id,
        };
        self.current.store(Arc::new(generation));
        // No subscribers is fine.
        let _ = self.refreshed.send(event.clone());
        event
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
