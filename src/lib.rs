//! Biblioteca Library Management System
//!
//! REST JSON API for a small lending library: catalog, clients, staff users,
//! loans with inventory tracking, settings and an audit trail.

use std::sync::Arc;

use sqlx::SqlitePool;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: SqlitePool,
}
