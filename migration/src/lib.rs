//! Database migrations for the Kylas relay.
//!
//! Owns the `leads` and `deals` tables that the relay upserts into.

pub use sea_orm_migration::prelude::*;

mod m2026_02_10_000001_create_leads;
mod m2026_02_10_000002_create_deals;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_02_10_000001_create_leads::Migration),
            Box::new(m2026_02_10_000002_create_deals::Migration),
        ]
    }
}
