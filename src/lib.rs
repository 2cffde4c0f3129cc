//! # Kylas Relay Library
//!
//! Receives Kylas CRM webhooks, normalizes lead and deal payloads, redacts
//! PII with SHA-256, upserts the records and reports qualified leads to the
//! Meta Conversions API.

pub mod config;
pub mod db;
pub mod error;
pub mod forwarders;
pub mod handlers;
pub mod hashing;
pub mod models;
pub mod normalization;
pub mod processor;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
