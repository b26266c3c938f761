use std::time::UNIX_EPOCH;

use axum::{
    extract::{Query, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{ChangeBatch, ChangeEvent};
use crate::http::server::AppState;
use crate::reload::{ReloadFailure, ReloadOutcome, ReloadState};
use crate::routing::RouteDefinition;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub generation: u64,
    pub revision: u64,
    pub route_count: usize,
    pub state: ReloadState,
    /// Seconds since the epoch at which the current generation was built.
    pub published_at: u64,
    /// Most recent reload that kept the previous generation serving.
    pub last_failure: Option<ReloadFailure>,
}

#[derive(Serialize)]
pub struct RouteList {
    pub generation: u64,
    pub routes: Vec<RouteDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub path: String,
    pub method: Option<String>,
    pub host: Option<String>,
}

#[derive(Serialize)]
pub struct MatchResult {
    pub generation: u64,
    pub route: RouteDefinition,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeParams {
    /// Block until the batch has been applied.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangeReceipt {
    pub batch_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PingQuery {
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct Pong {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub id: Uuid,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let current = state.table.current();
    let published_at = current
        .created_at()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        generation: current.number(),
        revision: current.revision(),
        route_count: current.len(),
        state: state.table.state(),
        published_at,
        last_failure: state.table.last_failure().map(|f| (*f).clone()),
    })
}

/// Liveness check; answers with a fresh id so callers can tell responses apart.
pub async fn get_ping(Query(query): Query<PingQuery>) -> Json<Pong> {
    Json(Pong {
        name: query.name,
        id: Uuid::new_v4(),
    })
}

pub async fn get_routes(State(state): State<AppState>) -> Json<RouteList> {
    let current = state.table.current();
    Json(RouteList {
        generation: current.number(),
        routes: current.routes().cloned().collect(),
    })
}

/// Dry-run a request against the current generation.
pub async fn get_match(State(state): State<AppState>, Query(query): Query<MatchQuery>) -> Response {
    let method = match query.method.as_deref().map(|m| m.to_ascii_uppercase()) {
        None => Method::GET,
        Some(m) => match Method::from_bytes(m.as_bytes()) {
            Ok(method) => method,
            Err(_) => return error(StatusCode::BAD_REQUEST, format!("invalid method `{}`", m)),
        },
    };

    let mut builder = Request::builder().method(method).uri(query.path.as_str());
    if let Some(host) = query.host.as_deref() {
        builder = builder.header(header::HOST, host);
    }
    let request = match builder.body(()) {
        Ok(request) => request,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid request: {}", e)),
    };

    let current = state.table.current();
    match current.match_request(&request) {
        Some(route) => Json(MatchResult {
            generation: current.number(),
            route: route.clone(),
        })
        .into_response(),
        None => error(StatusCode::NOT_FOUND, "no route matched"),
    }
}

/// Accept a change batch pushed by an external configuration source.
pub async fn post_changes(
    State(state): State<AppState>,
    Query(params): Query<ChangeParams>,
    Json(events): Json<Vec<ChangeEvent>>,
) -> Response {
    let batch = ChangeBatch::new(events);
    let batch_id = batch.id();
    tracing::info!(batch_id = %batch_id, events = batch.len(), wait = params.wait, "Change batch received");

    if !params.wait {
        return match state.reloads.submit(batch) {
            Ok(()) => (
                StatusCode::ACCEPTED,
                Json(ChangeReceipt {
                    batch_id,
                    outcome: None,
                    generation: None,
                    errors: Vec::new(),
                }),
            )
                .into_response(),
            Err(e) => error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        };
    }

    let outcome = match state.reloads.submit_and_wait(batch).await {
        Ok(outcome) => outcome,
        Err(e) => return error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    };

    let label = outcome.label().to_string();
    let (status, generation, errors) = match outcome {
        ReloadOutcome::Published(event) => (StatusCode::OK, event.generation, Vec::new()),
        ReloadOutcome::Unchanged { generation } => (StatusCode::OK, generation, Vec::new()),
        ReloadOutcome::Failed(e) => {
            let mut errors: Vec<String> = e.validation_errors().iter().map(ToString::to_string).collect();
            if errors.is_empty() {
                errors.push(e.to_string());
            }
            (StatusCode::UNPROCESSABLE_ENTITY, state.table.current().number(), errors)
        }
    };

    (
        status,
        Json(ChangeReceipt {
            batch_id,
            outcome: Some(label),
            generation: Some(generation),
            errors,
        }),
    )
        .into_response()
}
