//! Asset lending server
//!
//! REST JSON API for lending school equipment: borrowers request items,
//! staff approve and hand them out, and returns are checked back in with
//! their condition and lateness recorded.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
