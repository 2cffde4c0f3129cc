//! Lead repository for database operations
//!
//! Leads are written with an insert-or-update keyed on `lead_id`, so a
//! replayed webhook overwrites the stored row instead of adding one.

use anyhow::Result;
use sea_orm::{DatabaseConnection, EntityTrait, IntoActiveModel, sea_query::OnConflict};
use std::sync::Arc;

use crate::models::lead::{self, Entity as Lead};

/// Repository for lead database operations
#[derive(Debug, Clone)]
pub struct LeadRepository {
    pub db: Arc<DatabaseConnection>,
}

impl LeadRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert the lead, or overwrite every column except `created_at` when a
    /// row with the same `lead_id` exists.
    pub async fn upsert(&self, model: lead::Model) -> Result<()> {
        Lead::insert(model.into_active_model())
            .on_conflict(
                OnConflict::column(lead::Column::LeadId)
                    .update_columns([
                        lead::Column::FirstName,
                        lead::Column::LastName,
                        lead::Column::EmailHash,
                        lead::Column::PhoneHash,
                        lead::Column::Email,
                        lead::Column::Mobile,
                        lead::Column::Stage,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, lead_id: &str) -> Result<Option<lead::Model>> {
        let lead = Lead::find_by_id(lead_id.to_string())
            .one(&*self.db)
            .await?;
        Ok(lead)
    }
}
