//! # API Handlers
//!
//! HTTP endpoint handlers for the Kylas relay.

pub mod webhooks;

pub use webhooks::kylas_webhook;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = String, content_type = "text/plain")
    ),
    tag = "root"
)]
pub async fn root() -> &'static str {
    "Webhook server running"
}
