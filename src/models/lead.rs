//! Lead entity model
//!
//! SeaORM entity for the `leads` table. Rows are keyed by the CRM lead id
//! and hold hashed contact details.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "leads")]
pub struct Model {
    /// CRM lead id (natural key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub lead_id: String,

    pub first_name: String,

    pub last_name: String,

    /// SHA-256 hex digest of the primary email
    pub email_hash: Option<String>,

    /// SHA-256 hex digest of the primary phone number
    pub phone_hash: Option<String>,

    /// Plaintext email, only written when plaintext retention is enabled
    pub email: Option<String>,

    /// Plaintext phone number, only written when plaintext retention is enabled
    pub mobile: Option<String>,

    /// Lower-cased pipeline stage
    pub stage: String,

    /// First time the lead was stored; kept across upserts
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
