//! Test utilities for database testing.
//!
//! Sets up in-memory SQLite databases with migrations applied, and builds
//! routers wired to them.

#![allow(dead_code)]

use anyhow::Result;
use kylas_relay::config::AppConfig;
use kylas_relay::forwarders::{ConversionReporter, DatabaseRecordStore, RecordStore};
use kylas_relay::processor::WebhookProcessor;
use kylas_relay::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Same as [`setup_test_db`], wrapped in an `Arc`.
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(db))
}

/// Router over the given store, optionally reporting conversions.
pub fn app_with_store(
    store: Arc<dyn RecordStore>,
    reporter: Option<Arc<dyn ConversionReporter>>,
) -> axum::Router {
    let mut processor = WebhookProcessor::new(store);
    if let Some(reporter) = reporter {
        processor = processor.with_reporter(reporter);
    }

    create_app(AppState {
        config: Arc::new(AppConfig::default()),
        processor: Arc::new(processor),
    })
}

/// Router persisting into `db`.
pub fn app_with_db(
    db: Arc<DatabaseConnection>,
    reporter: Option<Arc<dyn ConversionReporter>>,
) -> axum::Router {
    app_with_store(Arc::new(DatabaseRecordStore::new(db)), reporter)
}
