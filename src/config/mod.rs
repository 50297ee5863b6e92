//! Configuration module for Switchboard
//!
//! Provides layered configuration loading from files, environment variables,
//! and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`SWITCHBOARD_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)

pub mod budget;
pub mod context;
pub mod error;
pub mod logging;
pub mod provider;
pub mod routing;
pub mod server;
pub mod tokens;

pub use budget::BudgetConfig;
pub use context::ContextConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use provider::ProviderConfig;
pub use routing::{PolicyRule, RoutingConfig};
pub use server::ServerConfig;
pub use tokens::{TokenLimits, TokensConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Unified configuration for the Switchboard router.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SwitchboardConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Routing policy table and override switches
    pub routing: RoutingConfig,
    /// Spend caps
    pub budget: BudgetConfig,
    /// Token budgets and estimation margin
    pub tokens: TokensConfig,
    /// Context compaction and durable memory
    pub context: ContextConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Upstream providers, keyed by id
    pub providers: HashMap<String, ProviderConfig>,
}

impl SwitchboardConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supports SWITCHBOARD_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("SWITCHBOARD_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("SWITCHBOARD_HOST") {
            self.server.host = host;
        }
        if let Ok(level) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SWITCHBOARD_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(cap) = std::env::var("SWITCHBOARD_MONTHLY_CAP_USD") {
            if let Ok(c) = cap.parse() {
                self.budget.monthly_cap_usd = c;
            }
        }
        self
    }

    /// Validate configuration. Called once at startup before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        for (id, provider) in &self.providers {
            if provider.base_url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("providers.{}.base_url", id),
                    message: "base URL cannot be empty".to_string(),
                });
            }
        }

        self.routing.validate().map_err(|message| ConfigError::Validation {
            field: "routing".to_string(),
            message,
        })?;
        self.budget.validate().map_err(|message| ConfigError::Validation {
            field: "budget".to_string(),
            message,
        })?;
        self.tokens.validate().map_err(|message| ConfigError::Validation {
            field: "tokens".to_string(),
            message,
        })?;
        self.context.validate().map_err(|message| ConfigError::Validation {
            field: "context".to_string(),
            message,
        })?;

        Ok(())
    }
}
