//! The reload coordinator.
//!
//! # Responsibilities
//! - Receive change batches and full replacements in arrival order
//! - Run reduce → mutate → compile → publish for one command at a time
//! - Keep the last good generation published when compilation fails
//! - Acknowledge submitters that asked for the outcome
//!
//! # Design Decisions
//! - A single task owns the pipeline; an unbounded FIFO channel queues
//!   commands, so nothing is dropped and nothing is reordered
//! - Compilation runs on the blocking pool under a time budget
//! - No recompilation when the store revision already matches the
//!   published generation (redelivered or irrelevant batches)

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::Instrument;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::events::{ChangeBatch, Reducer, Verdict};
use crate::observability::metrics;
use crate::reload::state::ReloadState;
use crate::reload::table::{RouteTable, RoutesRefreshed};
use crate::routing::compiler;
use crate::routing::{
    CompileError, FilterDefinition, RouteDefinition, RouteStore, RouteTableGeneration, StoreSnapshot,
};

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct ReloadSettings {
    /// Upper bound on one compilation.
    pub compile_budget: Duration,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            compile_budget: Duration::from_secs(2),
        }
    }
}

/// What happened to one submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new generation is live.
    Published(RoutesRefreshed),
    /// The store did not move; the current generation stays.
    Unchanged { generation: u64 },
    /// Compilation failed; the current generation stays.
    Failed(CompileError),
}

impl ReloadOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            ReloadOutcome::Published(_) => "published",
            ReloadOutcome::Unchanged { .. } => "unchanged",
            ReloadOutcome::Failed(_) => "failed",
        }
    }
}

/// Submitting to a coordinator that is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReloadError {
    #[error("Reload coordinator has stopped")]
    Stopped,
}

/// Anything that accepts change batches from a transport adapter.
pub trait ChangeConsumer: Send + Sync {
    fn submit(&self, batch: ChangeBatch) -> Result<(), ReloadError>;
}

#[derive(Debug)]
enum Command {
    Apply {
        batch: ChangeBatch,
        ack: Option<oneshot::Sender<ReloadOutcome>>,
    },
    Replace {
        routes: Vec<RouteDefinition>,
        default_filters: Vec<FilterDefinition>,
        ack: Option<oneshot::Sender<ReloadOutcome>>,
    },
}

/// Cloneable sending side of the coordinator queue.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ReloadHandle {
    /// Queue a batch without waiting for it.
    pub fn submit(&self, batch: ChangeBatch) -> Result<(), ReloadError> {
        self.send(Command::Apply { batch, ack: None })
    }

    /// Queue a batch and wait until it has been applied.
    pub async fn submit_and_wait(&self, batch: ChangeBatch) -> Result<ReloadOutcome, ReloadError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Apply {
            batch,
            ack: Some(ack),
        })?;
        done.await.map_err(|_| ReloadError::Stopped)
    }

    /// Queue a full replacement of the route set.
    pub fn replace_all(
        &self,
        routes: Vec<RouteDefinition>,
        default_filters: Vec<FilterDefinition>,
    ) -> Result<(), ReloadError> {
        self.send(Command::Replace {
            routes,
            default_filters,
            ack: None,
        })
    }

    pub async fn replace_all_and_wait(
        &self,
        routes: Vec<RouteDefinition>,
        default_filters: Vec<FilterDefinition>,
    ) -> Result<ReloadOutcome, ReloadError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Replace {
            routes,
            default_filters,
            ack: Some(ack),
        })?;
        done.await.map_err(|_| ReloadError::Stopped)
    }

    fn send(&self, command: Command) -> Result<(), ReloadError> {
        self.tx.send(command).map_err(|_| ReloadError::Stopped)
    }
}

impl ChangeConsumer for ReloadHandle {
    fn submit(&self, batch: ChangeBatch) -> Result<(), ReloadError> {
        ReloadHandle::submit(self, batch)
    }
}

/// Serialized reload pipeline over a store and a published table.
pub struct ReloadCoordinator {
    store: Arc<RouteStore>,
    table: Arc<RouteTable>,
    reducer: Reducer,
    settings: ReloadSettings,
}

impl ReloadCoordinator {
    pub fn new(
        store: Arc<RouteStore>,
        table: Arc<RouteTable>,
        reducer: Reducer,
        settings: ReloadSettings,
    ) -> Self {
        Self {
            store,
            table,
            reducer,
            settings,
        }
    }

    /// Start the pipeline task.
    ///
    /// The task stops once every handle is dropped or `shutdown` fires;
    /// commands already queued ahead of the signal are still applied.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> (ReloadHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx, shutdown));
        (ReloadHandle { tx }, task)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            compile_budget = ?self.settings.compile_budget,
            key_prefix = %self.reducer.keys().prefix(),
            "Reload coordinator started"
        );
        let mut shutdown_open = true;

        loop {
            tokio::select! {
                biased;
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        tracing::info!("All reload handles dropped, coordinator exiting");
                        break;
                    }
                },
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Err(broadcast::error::RecvError::Closed) => shutdown_open = false,
                    _ => {
                        tracing::info!("Reload coordinator received shutdown signal, exiting loop");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&self, command: Command) {
        let started = Instant::now();
        let (outcome, ack) = match command {
            Command::Apply { batch, ack } => {
                let span = tracing::info_span!("reload", batch_id = %batch.id(), events = batch.len());
                (self.apply_batch(&batch).instrument(span).await, ack)
            }
            Command::Replace {
                routes,
                default_filters,
                ack,
            } => (self.replace(routes, default_filters).await, ack),
        };

        metrics::record_reload(outcome.label(), started);
        if let Some(ack) = ack {
            // The submitter may have stopped waiting.
            let _ = ack.send(outcome);
        }
    }

    async fn apply_batch(&self, batch: &ChangeBatch) -> ReloadOutcome {
        metrics::record_change_events(batch);

        self.table.set_state(ReloadState::Reducing);
        let before = self.store.snapshot();
        let reduction = self.reducer.reduce(batch, &before);

        self.table.set_state(ReloadState::Mutating);
        if reduction.verdict == Verdict::FullClear {
            tracing::info!(routes = before.len(), "Every route deleted upstream, clearing store");
        }
        let report = self.store.apply(&reduction);
        for error in &report.errors {
            tracing::warn!(error = %error, "Skipping store mutation");
            metrics::record_store_error();
        }

        self.compile_and_publish(batch.id()).await
    }

    async fn replace(
        &self,
        routes: Vec<RouteDefinition>,
        default_filters: Vec<FilterDefinition>,
    ) -> ReloadOutcome {
        let batch_id = Uuid::new_v4();
        tracing::info!(batch_id = %batch_id, routes = routes.len(), "Replacing all routes");

        self.table.set_state(ReloadState::Mutating);
        self.store.replace_all(routes, default_filters);

        self.compile_and_publish(batch_id).await
    }

    async fn compile_and_publish(&self, batch_id: Uuid) -> ReloadOutcome {
        let snapshot = self.store.snapshot();
        let current = self.table.current();

        if snapshot.revision() == current.revision() {
            tracing::debug!(generation = current.number(), "Store unchanged, keeping generation");
            self.table.set_state(ReloadState::Idle);
            return ReloadOutcome::Unchanged {
                generation: current.number(),
            };
        }

        self.table.set_state(ReloadState::Compiling);
        let result = compile_within(snapshot, current.number() + 1, self.settings.compile_budget).await;

        match result {
            Ok(generation) => {
                self.table.set_state(ReloadState::Publishing);
                let event = self.table.publish(generation, batch_id);
                metrics::record_generation(event.generation, event.route_count);
                tracing::info!(
                    generation = event.generation,
                    revision = event.revision,
                    routes = event.route_count,
                    "Route table published"
                );
                self.table.set_state(ReloadState::Idle);
                ReloadOutcome::Published(event)
            }
            Err(error) => {
                self.table.set_state(ReloadState::Failed);
                for problem in error.validation_errors() {
                    tracing::warn!(error = %problem, "Route validation failed");
                }
                metrics::record_validation_errors(error.validation_errors().len());
                tracing::error!(
                    generation = current.number(),
                    error = %error,
                    "Reload failed, keeping current generation"
                );
                self.table.record_failure(batch_id, &error);
                self.table.set_state(ReloadState::Idle);
                ReloadOutcome::Failed(error)
            }
        }
    }
}

async fn compile_within(
    snapshot: StoreSnapshot,
    number: u64,
    budget: Duration,
) -> Result<RouteTableGeneration, CompileError> {
    let task = tokio::task::spawn_blocking(move || compiler::compile(&snapshot, number));
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(CompileError::Aborted(join_error.to_string())),
        Err(_) => Err(CompileError::BudgetExceeded(budget)),
    }
}
