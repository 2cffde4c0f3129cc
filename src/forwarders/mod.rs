//! # Forwarders
//!
//! Downstream collaborators of the webhook processor. Each one sits behind
//! a trait so the processor can be driven with fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::hashing::HashedFields;
use crate::normalization::CanonicalDeal;

pub mod audit;
pub mod meta;
pub mod persistence;

pub use audit::AuditLog;
pub use meta::MetaConversionsClient;
pub use persistence::DatabaseRecordStore;

/// A redacted lead ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub lead_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email_hash: Option<String>,
    pub phone_hash: Option<String>,
    /// Set only when plaintext retention is enabled.
    pub email: Option<String>,
    /// Set only when plaintext retention is enabled.
    pub mobile: Option<String>,
    pub stage: String,
    pub created_at: DateTime<Utc>,
}

/// A qualified lead reported to the ad platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub lead_id: String,
    pub stage: String,
    pub value: f64,
    pub event_time: DateTime<Utc>,
    pub user_data: HashedFields,
}

/// Failure reported by a forwarder.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Insert-or-update sink for canonical records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_lead(&self, record: &LeadRecord) -> anyhow::Result<()>;

    async fn upsert_deal(&self, deal: &CanonicalDeal) -> anyhow::Result<()>;
}

/// Ad-platform conversion reporting.
#[async_trait]
pub trait ConversionReporter: Send + Sync {
    async fn report(&self, event: &ConversionEvent) -> Result<(), ForwardError>;
}
