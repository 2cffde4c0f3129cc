//! # Webhook Handlers
//!
//! Receives Kylas CRM webhooks. The body is read as raw bytes so that an
//! empty or malformed body is answered with the same `400` as a body
//! without an `event`.

use axum::{body::Bytes, extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::server::AppState;

/// Webhook body as sent by Kylas
#[derive(Debug, Deserialize, ToSchema)]
pub struct KylasWebhookPayload {
    /// Event name, e.g. `lead.created`, `LEAD_UPDATED`, `deal.updated`
    pub event: String,
    /// Legacy lead fields or deal fields
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    /// Lead fields on `LEAD_UPDATED`
    #[schema(value_type = Object)]
    pub entity: Option<JsonValue>,
}

/// Webhook accept response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    /// `success` or `ignored`
    pub status: String,
}

/// Receive a Kylas webhook
#[utoipa::path(
    post,
    path = "/kylas-webhook",
    request_body = KylasWebhookPayload,
    responses(
        (status = 200, description = "Webhook processed or ignored", body = WebhookResponse),
        (status = 400, description = "Missing body or event", body = ApiError),
        (status = 500, description = "Processing failed", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn kylas_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let payload = serde_json::from_slice::<JsonValue>(&body).ok();
    debug!(bytes = body.len(), parsed = payload.is_some(), "Received Kylas webhook");

    let outcome = state.processor.process(payload.as_ref()).await?;

    Ok(Json(WebhookResponse {
        status: outcome.as_str().to_string(),
    }))
}
