//! # Kylas Relay Main Entry Point

use std::sync::Arc;

use kylas_relay::{
    config::ConfigLoader,
    db,
    forwarders::{AuditLog, DatabaseRecordStore, MetaConversionsClient},
    hashing::Redactor,
    processor::WebhookProcessor,
    server::{AppState, run_server},
    telemetry,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config).await?;
    db::run_migrations(&db).await?;

    let store = Arc::new(DatabaseRecordStore::new(Arc::new(db)));
    let mut processor = WebhookProcessor::new(store)
        .with_redactor(Redactor::new(config.redaction.hash_normalization))
        .with_stage_gate(config.redaction.stage_gate)
        .retain_plaintext_pii(config.redaction.retain_plaintext_pii);

    match MetaConversionsClient::from_config(&config.meta)? {
        Some(client) => {
            info!(endpoint = client.endpoint(), "Meta conversion reporting enabled");
            processor = processor.with_reporter(Arc::new(client));
        }
        None => info!("Meta conversion reporting disabled"),
    }

    if let Some(path) = &config.audit_log_path {
        info!(path = %path.display(), "Appending webhook bodies to audit log");
        processor = processor.with_audit_log(AuditLog::new(path.clone()));
    }

    let state = AppState {
        config: Arc::new(config),
        processor: Arc::new(processor),
    };
    run_server(state).await
}
