//! Database-backed [`RecordStore`].

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use super::{LeadRecord, RecordStore};
use crate::models::{deal, lead};
use crate::normalization::CanonicalDeal;
use crate::repositories::{DealRepository, LeadRepository};

/// Writes leads and deals through their repositories.
#[derive(Debug, Clone)]
pub struct DatabaseRecordStore {
    leads: LeadRepository,
    deals: DealRepository,
}

impl DatabaseRecordStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            leads: LeadRepository::new(db.clone()),
            deals: DealRepository::new(db),
        }
    }
}

#[async_trait]
impl RecordStore for DatabaseRecordStore {
    async fn upsert_lead(&self, record: &LeadRecord) -> anyhow::Result<()> {
        let model = lead::Model {
            lead_id: record.lead_id.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email_hash: record.email_hash.clone(),
            phone_hash: record.phone_hash.clone(),
            email: record.email.clone(),
            mobile: record.mobile.clone(),
            stage: record.stage.clone(),
            created_at: record.created_at.into(),
        };
        self.leads.upsert(model).await
    }

    async fn upsert_deal(&self, deal: &CanonicalDeal) -> anyhow::Result<()> {
        let model = deal::Model {
            deal_id: deal.deal_id.clone(),
            deal_name: deal.deal_name.clone(),
            deal_value: deal.deal_value,
            stage: deal.stage.clone(),
            owner_id: deal.owner_id.clone(),
            owner_name: deal.owner_name.clone(),
            lead_id: deal.lead_id.clone(),
            updated_at: deal.updated_at.into(),
        };
        self.deals.upsert(model).await
    }
}
