//! Migration to create the deals table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deals::DealId).text().not_null().primary_key())
                    .col(ColumnDef::new(Deals::DealName).text().not_null())
                    .col(ColumnDef::new(Deals::DealValue).double())
                    .col(ColumnDef::new(Deals::Stage).text().not_null())
                    .col(ColumnDef::new(Deals::OwnerId).text())
                    .col(ColumnDef::new(Deals::OwnerName).text())
                    .col(ColumnDef::new(Deals::LeadId).text())
                    .col(
                        ColumnDef::new(Deals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Deals {
    Table,
    DealId,
    DealName,
    DealValue,
    Stage,
    OwnerId,
    OwnerName,
    LeadId,
    UpdatedAt,
}
