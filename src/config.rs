//! Configuration management for the Visitor Desk service

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin used to mint blob URLs handed to the views
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

/// Endpoints of the external visitor API
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub visitors_path: String,
    pub employees_path: String,
    pub visitor_image_path: String,
    pub asset_image_path: String,
    pub guest_photo_path: String,
    pub profile_image_path: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FlowConfig {
    /// Maximum number of concurrently open flow sessions
    pub max_sessions: usize,
    /// Base of the visitor pass link encoded in the share QR
    pub share_base_url: String,
    /// Sessions untouched for this long are evicted
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub flow: FlowConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // VISITOR_DESK_UPSTREAM__BASE_URL, VISITOR_DESK_FLOW__MAX_SESSIONS, ...
            .add_source(
                Environment::with_prefix("VISITOR_DESK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("upstream.base_url", env::var("UPSTREAM_API_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            visitors_path: "/visitors".to_string(),
            employees_path: "/employees".to_string(),
            visitor_image_path: "/visitors/image".to_string(),
            asset_image_path: "/visitors/asset-image".to_string(),
            guest_photo_path: "/visitors/guest-photo".to_string(),
            profile_image_path: "/employees/profile-image".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            share_base_url: "http://localhost:3000/visitor-pass".to_string(),
            idle_timeout_seconds: 30 * 60,
        }
    }
}
