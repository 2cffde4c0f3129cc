//! # Error Handling
//!
//! Domain errors raised while processing a webhook, and their mapping onto
//! the JSON error body returned to Kylas. Internal detail is logged with the
//! request trace id and never echoed to the caller.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::normalization::NormalizationError;
use crate::telemetry;

/// Errors that abort webhook processing.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The body is absent, not a JSON object, or names no event.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// The data store rejected an upsert.
    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl From<NormalizationError> for RelayError {
    fn from(error: NormalizationError) -> Self {
        match error {
            NormalizationError::InvalidPayload(reason) => {
                RelayError::InvalidPayload(reason.to_string())
            }
        }
    }
}

/// Error body returned by the webhook endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// `"Invalid payload"` or `"Server error"`
    pub message: Box<str>,
    /// Correlation id, also sent as `x-request-id`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into().into_boxed_str(),
            trace_id: telemetry::current_trace_id().map(String::into_boxed_str),
        }
    }

    pub fn invalid_payload() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid payload")
    }

    pub fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(trace_id) = &self.trace_id
            && let Ok(value) = HeaderValue::from_str(trace_id)
        {
            headers.insert(telemetry::REQUEST_ID_HEADER, value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(error: RelayError) -> Self {
        match error {
            RelayError::InvalidPayload(reason) => {
                tracing::warn!(%reason, "Rejected webhook payload");
                Self::invalid_payload()
            }
            RelayError::Persistence(source) => {
                tracing::error!(error = ?source, "Webhook persistence failed");
                Self::server_error()
            }
        }
    }
}
