//! Deal repository for database operations

use anyhow::Result;
use sea_orm::{DatabaseConnection, EntityTrait, IntoActiveModel, sea_query::OnConflict};
use std::sync::Arc;

use crate::models::deal::{self, Entity as Deal};

/// Repository for deal database operations
#[derive(Debug, Clone)]
pub struct DealRepository {
    pub db: Arc<DatabaseConnection>,
}

impl DealRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert the deal, or overwrite all of its columns when `deal_id` exists.
    pub async fn upsert(&self, model: deal::Model) -> Result<()> {
        Deal::insert(model.into_active_model())
            .on_conflict(
                OnConflict::column(deal::Column::DealId)
                    .update_columns([
                        deal::Column::DealName,
                        deal::Column::DealValue,
                        deal::Column::Stage,
                        deal::Column::OwnerId,
                        deal::Column::OwnerName,
                        deal::Column::LeadId,
                        deal::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, deal_id: &str) -> Result<Option<deal::Model>> {
        let deal = Deal::find_by_id(deal_id.to_string())
            .one(&*self.db)
            .await?;
        Ok(deal)
    }
}
