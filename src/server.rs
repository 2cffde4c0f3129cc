//! # Server Configuration
//!
//! Router assembly and the HTTP listener for the Kylas relay.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::processor::WebhookProcessor;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub processor: Arc<WebhookProcessor>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/kylas-webhook", post(handlers::kylas_webhook))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(telemetry::trace_id_middleware))
}

/// Starts the server and serves until Ctrl-C.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let addr = state
        .config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %state.config.profile, "Server listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::webhooks::kylas_webhook,
    ),
    components(
        schemas(
            crate::handlers::webhooks::KylasWebhookPayload,
            crate::handlers::webhooks::WebhookResponse,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Kylas Relay API",
        description = "Receives Kylas CRM webhooks, stores redacted leads and deals, and reports conversions to Meta",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
