//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use route_reloader::events::{ChangeEvent, KeyPattern, Reducer};
use route_reloader::http::{AdminServer, AppState};
use route_reloader::lifecycle::Shutdown;
use route_reloader::reload::{ReloadCoordinator, ReloadHandle, ReloadSettings, RouteTable};
use route_reloader::routing::RouteStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const PREFIX: &str = "gateway.";

/// A running coordinator with its store and table.
pub struct Pipeline {
    pub store: Arc<RouteStore>,
    pub table: Arc<RouteTable>,
    pub reloads: ReloadHandle,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

pub fn spawn_pipeline() -> Pipeline {
    let store = Arc::new(RouteStore::new());
    let table = Arc::new(RouteTable::new());
    let shutdown = Shutdown::new();

    let (reloads, task) = ReloadCoordinator::new(
        store.clone(),
        table.clone(),
        Reducer::new(KeyPattern::new(PREFIX)),
        ReloadSettings {
            compile_budget: Duration::from_secs(5),
        },
    )
    .spawn(shutdown.subscribe());

    Pipeline {
        store,
        table,
        reloads,
        shutdown,
        task,
    }
}

fn key(slot: usize, field: &str) -> String {
    KeyPattern::new(PREFIX).route_key(slot, field)
}

/// ADDED events describing one route.
pub fn add_route(slot: usize, id: &str, uri: &str, predicates: &[&str]) -> Vec<ChangeEvent> {
    let mut events = vec![
        ChangeEvent::added(key(slot, "id"), id),
        ChangeEvent::added(key(slot, "uri"), uri),
    ];
    for (i, p) in predicates.iter().enumerate() {
        events.push(ChangeEvent::added(key(slot, &format!("predicates[{}]", i)), *p));
    }
    events
}

/// DELETED events removing every key of one route.
pub fn delete_route(slot: usize, id: &str, uri: &str, predicates: &[&str]) -> Vec<ChangeEvent> {
    let mut events = vec![
        ChangeEvent::deleted(key(slot, "id"), id),
        ChangeEvent::deleted(key(slot, "uri"), uri),
    ];
    for (i, p) in predicates.iter().enumerate() {
        events.push(ChangeEvent::deleted(key(slot, &format!("predicates[{}]", i)), *p));
    }
    events
}

pub fn modify(slot: usize, field: &str, old: &str, new: &str) -> ChangeEvent {
    ChangeEvent::modified(key(slot, field), old, new)
}

/// Serve the admin API for `pipeline` on an ephemeral port.
pub async fn start_admin(pipeline: &Pipeline, api_key: Option<&str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(
        pipeline.table.clone(),
        pipeline.reloads.clone(),
        api_key.map(str::to_string),
    );
    tokio::spawn(AdminServer::new(state).run(listener, pipeline.shutdown.subscribe()));
    addr
}

pub fn get(path: &str) -> axum::http::Request<()> {
    axum::http::Request::builder().uri(path).body(()).unwrap()
}
