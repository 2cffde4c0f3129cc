//! # Data Models
//!
//! SeaORM entities for the records this relay stores.

pub mod deal;
pub mod lead;

pub use deal::Entity as Deal;
pub use lead::Entity as Lead;
