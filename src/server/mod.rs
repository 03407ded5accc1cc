//! HTTP and WebSocket surface.

pub mod error;
pub mod routes;
pub mod ws;

use crate::interactions::InteractionStore;
use crate::service::SpeechService;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use error::ApiError;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state; clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SpeechService>,
    pub interactions: Arc<InteractionStore>,
    /// Concurrency limiter for request/response endpoints.
    pub request_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(service: Arc<SpeechService>) -> Self {
        let max_concurrent = service.config().server.max_concurrent_requests;
        Self {
            service,
            interactions: Arc::new(InteractionStore::new()),
            request_semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Acquire a permit for concurrent request processing
    pub async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        Arc::clone(&self.request_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ApiError::unavailable("server is shutting down"))
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/transcribe", post(routes::transcribe))
        .route("/synthesize", post(routes::synthesize))
        .route("/health", get(routes::health))
        .route("/api/supported-languages", get(routes::supported_languages))
        .route("/api/supported-voices", get(routes::supported_voices))
        .route("/api/websocket-status", get(routes::websocket_status))
        .route("/ws", get(routes::stream))
        .route("/ws/{language}", get(routes::stream_language))
        .route("/sessions", post(routes::create_session))
        .route("/sessions/{user_id}", get(routes::list_sessions))
        .route("/interactions", post(routes::save_interaction))
        .route("/interactions/{session_id}", get(routes::list_interactions))
        .layer(DefaultBodyLimit::max(crate::defaults::MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn run_server(service: Arc<SpeechService>) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        service.config().server.host,
        service.config().server.port
    );

    let preloaded = service.preload().await;
    if preloaded > 0 {
        tracing::info!(languages = preloaded, "engines preloaded");
    }

    let app = create_router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
