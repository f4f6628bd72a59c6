//! Configuration management for the Stride engine
//!
//! Configuration is loaded hierarchically:
//! 1. Default values (in code)
//! 2. TOML config files (config/development.toml or config/production.toml)
//! 3. Environment variables (prefix: STRIDE__)

use std::env;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
}

/// Local store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for the embedded database.
    pub path: String,
    /// Use a throwaway store instead of the durable path.
    pub ephemeral: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: ".stride/db".to_string(),
                ephemeral: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Loading order (later sources override earlier):
    /// 1. Default values
    /// 2. Config file based on RUST_ENV (development.toml or production.toml)
    /// 3. Environment variables with STRIDE__ prefix
    pub fn load() -> Result<Self> {
        let env = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        let config_file = format!("config/{}.toml", env);
        Self::load_from(Some(Path::new(&config_file)))
    }

    /// Load configuration with an explicit (optional) config file path.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path).required(false),
            );
        }

        // Override with environment variables (STRIDE__ prefix)
        // e.g., STRIDE__STORE__PATH=/tmp/db sets store.path
        let built = builder
            .add_source(config::Environment::with_prefix("STRIDE").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }
}
