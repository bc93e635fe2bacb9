//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Guard privileged routes with the admin bearer token
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown signal fires

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::router::RouterCore;
use crate::http::auth::admin_auth_middleware;
use crate::http::handlers;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<RouterCore>,
}

/// HTTP server for the router API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over `core`.
    pub fn new(core: Arc<RouterCore>) -> Self {
        let request_timeout = Duration::from_secs(core.config().listener.request_timeout_secs);
        let router = Self::build_router(AppState { core }, request_timeout);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let privileged = Router::new()
            .route("/v1/failover", post(handlers::force_failover))
            .route("/v1/alerts/{id}/resolve", post(handlers::resolve_alert))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_auth_middleware,
            ));

        Router::new()
            .route("/v1/routing/{user_id}", get(handlers::get_routing))
            .route("/v1/regions", get(handlers::get_regions))
            .route("/v1/regions/{id}/history", get(handlers::get_region_history))
            .route("/v1/metrics", post(handlers::record_metric))
            .route("/v1/health", get(handlers::get_system_health))
            .route("/v1/alerts", get(handlers::get_alerts))
            .route("/v1/failovers/{user_id}", get(handlers::get_failovers))
            .merge(privileged)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
