//! Admin HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the admin router with shared state
//! - Wire up middleware (access log, tracing)
//! - Serve on a listener until shutdown

use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::http::access_log::access_log;
use crate::reload::{ReloadHandle, RouteTable};

/// State injected into admin handlers.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
    pub reloads: ReloadHandle,
    /// Bearer token; `None` leaves the API open.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(table: Arc<RouteTable>, reloads: ReloadHandle, api_key: Option<String>) -> Self {
        Self {
            table,
            reloads,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(state: AppState) -> Self {
        let router = setup_admin_router(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(access_log)),
        );
        Self { router }
    }

    /// The assembled router, for in-process callers.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}
