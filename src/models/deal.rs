//! Deal entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Deal as last reported by a `deal.updated` webhook
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub deal_id: String,

    pub deal_name: String,

    #[sea_orm(column_type = "Double", nullable)]
    pub deal_value: Option<f64>,

    pub stage: String,

    pub owner_id: Option<String>,

    pub owner_name: Option<String>,

    /// CRM lead the deal was converted from, if any
    pub lead_id: Option<String>,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
