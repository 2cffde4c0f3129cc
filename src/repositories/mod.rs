//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! stored lead and deal records.

pub mod deal;
pub mod lead;

pub use deal::DealRepository;
pub use lead::LeadRepository;
