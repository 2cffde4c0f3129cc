//! Logging setup and per-request correlation for the relay.
//!
//! Every webhook runs inside a task-local [`TraceContext`] so error bodies
//! and log lines share the `x-request-id` Kylas sees on the response.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use log::LevelFilter;
use metrics::counter;
use thiserror::Error;
use tokio::task_local;
use tracing::Instrument;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id of the webhook currently being handled.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

task_local! {
    static WEBHOOK_TRACE: TraceContext;
}

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("log bridge install failed: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("subscriber install failed: {0}")]
    Subscriber(#[from] TryInitError),
}

static SUBSCRIBER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins over `log_level`. `log_format = "pretty"` selects
/// human-readable output, anything else emits JSON lines.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if SUBSCRIBER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    // sea-orm and sqlx log through `log`.
    if let Err(err) = LogTracer::builder().with_max_level(LevelFilter::Trace).init() {
        eprintln!("kylas-relay: log records will bypass tracing: {err}");
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let output = if config.log_format == "pretty" {
        fmt::layer().pretty().boxed()
    } else {
        fmt::layer().json().boxed()
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
    {
        SUBSCRIBER_INSTALLED.store(false, Ordering::SeqCst);
        eprintln!("kylas-relay: keeping existing tracing subscriber: {err}");
    }

    Ok(())
}

/// Run `future` with `context` as the active webhook trace.
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    WEBHOOK_TRACE.scope(context, future).await
}

/// Trace id of the webhook running on this task, if any.
pub fn current_trace_id() -> Option<String> {
    WEBHOOK_TRACE
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}

/// Middleware assigning each request a trace id.
///
/// An inbound `x-request-id` is reused, otherwise a v4 UUID is generated.
/// The id is scoped to the request task, attached to a tracing span and
/// echoed on the response.
pub async fn trace_id_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let context = TraceContext {
        trace_id: trace_id.clone(),
    };
    request.extensions_mut().insert(context.clone());

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = with_trace_context(context, next.run(request))
        .instrument(span)
        .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Count one processed webhook by outcome (`success`, `ignored`, `invalid`, `error`).
pub fn record_webhook(outcome: &'static str) {
    let labels = vec![("outcome", outcome.to_string())];
    counter!("kylas_webhooks_total", &labels).increment(1);
}

/// Count one failed downstream forward by target (`persistence`, `meta`, `audit`).
pub fn record_forward_failure(target: &'static str) {
    let labels = vec![("target", target.to_string())];
    counter!("kylas_forward_failures_total", &labels).increment(1);
}
