//! Migration to create the leads table.
//!
//! Leads are keyed by the CRM lead id so that replayed webhooks upsert the
//! same row. Plaintext `email`/`mobile` stay NULL unless plaintext
//! retention is switched on.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Leads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Leads::LeadId).text().not_null().primary_key())
                    .col(ColumnDef::new(Leads::FirstName).text().not_null())
                    .col(ColumnDef::new(Leads::LastName).text().not_null())
                    .col(ColumnDef::new(Leads::EmailHash).text())
                    .col(ColumnDef::new(Leads::PhoneHash).text())
                    .col(ColumnDef::new(Leads::Email).text())
                    .col(ColumnDef::new(Leads::Mobile).text())
                    .col(ColumnDef::new(Leads::Stage).text().not_null())
                    .col(
                        ColumnDef::new(Leads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-leads-stage")
                    .table(Leads::Table)
                    .col(Leads::Stage)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Leads::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Leads {
    Table,
    LeadId,
    FirstName,
    LastName,
    EmailHash,
    PhoneHash,
    Email,
    Mobile,
    Stage,
    CreatedAt,
}
