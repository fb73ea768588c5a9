// src/lib.rs
//! Parts dispatch tracking.
//!
//! [`scan`] holds the scan-station core: barcode and QR parsing, consistency
//! checks, duplicate-serial guarding, per-invoice counters and the debounced
//! statistics reporter. The remaining modules are the actix-web backend the
//! stations report to.

use sqlx::SqlitePool;

#[cfg(test)]
#[macro_use]
mod test_support;

pub mod auth;
pub mod auth_handlers;
pub mod bin_handlers;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod invoice_handlers;
pub mod models;
pub mod monitoring;
pub mod part_handlers;
pub mod routes;
pub mod scan;
pub mod statistics_handlers;

pub use config::Config;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
}
