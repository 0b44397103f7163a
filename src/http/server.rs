//! Sample HTTP server served from a handover listener.
//!
//! # Responsibilities
//! - Create the Axum Router with the sample handler
//! - Wire up middleware (tracing, request timeout)
//! - Serve on the handed-over listener until shutdown, then drain
//!
//! The handler sleeps for `?s=<ms>` before answering `OK`, which keeps
//! requests in flight across a handover and makes dropped connections
//! visible to a load generator.

use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    requests: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct SleepParams {
    /// Milliseconds to sleep before answering.
    s: Option<u64>,
}

/// HTTP server for one process generation.
pub struct HttpServer {
    router: Router,
    requests: Arc<AtomicU64>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig) -> Self {
        let requests = Arc::new(AtomicU64::new(0));
        let state = AppState { requests: Arc::clone(&requests) };
        let router = Self::build_router(config, state);
        Self { router, requests }
    }

    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(sleep_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Counter of requests served, readable after the server is consumed.
    pub fn request_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.requests)
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Now accepting HTTP requests");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!(
            served = self.requests.load(Ordering::Relaxed),
            "HTTP server stopped"
        );
        Ok(())
    }
}

async fn sleep_handler(
    State(state): State<AppState>,
    Query(params): Query<SleepParams>,
) -> &'static str {
    state.requests.fetch_add(1, Ordering::Relaxed);

    if let Some(ms) = params.s {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    "OK"
}
