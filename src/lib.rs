//! Visitor Desk
//!
//! Backend for the host-initiated visitor registration screens: keeps the
//! compose -> preview -> share flow state, resolves visitor, guest, asset and
//! host images behind authenticated fetches, and patches incomplete host
//! records from the employee directory before anything is rendered.

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

impl AppState {
    pub fn new(config: AppConfig, api: Arc<dyn repository::VisitorApi>) -> Self {
        let services = services::Services::new(&config, api);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
