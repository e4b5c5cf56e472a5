use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::billing::validation::validate_tenant;
use crate::error::{EntitlementsError, Result};
use crate::utils::get_env_with_prefix;

/// Longest trial any configuration may grant.
const MAX_TRIAL_DAYS: u32 = 365;

/// Main configuration for the entitlement engine
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub trial: TrialConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Trial lengths, in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrialConfig {
    /// Full-access trial started with `start_trial`
    #[serde(default = "default_general_trial_days")]
    pub general_trial_days: u32,
    /// Basic-plan trial granted to buyers
    #[serde(default = "default_buyer_trial_days")]
    pub buyer_trial_days: u32,
}

/// Local persistence backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on restart (default)
    #[default]
    Memory,
    /// One JSON document per account under `StorageConfig::path`
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Scope prefix for every stored key
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            general_trial_days: default_general_trial_days(),
            buyer_trial_days: default_buyer_trial_days(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            tenant: default_tenant(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_general_trial_days() -> u32 {
    14
}

fn default_buyer_trial_days() -> u32 {
    30
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".strefex/subscriptions")
}

fn default_tenant() -> String {
    "default".to_string()
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_general_trial_days(mut self, days: u32) -> Self {
        self.config.trial.general_trial_days = days;
        self
    }

    pub fn with_buyer_trial_days(mut self, days: u32) -> Self {
        self.config.trial.buyer_trial_days = days;
        self
    }

    pub fn with_storage_backend(mut self, backend: StorageBackend) -> Self {
        self.config.storage.backend = backend;
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.path = path.into();
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.storage.tenant = tenant.into();
        self
    }

    /// Load configuration from environment variables with STREFEX_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(days) = get_env_with_prefix("GENERAL_TRIAL_DAYS") {
            if let Ok(d) = days.parse() {
                self.config.trial.general_trial_days = d;
            }
        }
        if let Some(days) = get_env_with_prefix("BUYER_TRIAL_DAYS") {
            if let Ok(d) = days.parse() {
                self.config.trial.buyer_trial_days = d;
            }
        }
        if let Some(backend) = get_env_with_prefix("STORAGE_BACKEND") {
            self.config.storage.backend = match backend.to_lowercase().as_str() {
                "file" => StorageBackend::File,
                "memory" => StorageBackend::Memory,
                other => {
                    tracing::warn!(
                        target: "strefex::config",
                        backend = %other,
                        "Unknown storage backend, using in-memory"
                    );
                    StorageBackend::Memory
                }
            };
        }
        if let Some(path) = get_env_with_prefix("STORAGE_PATH") {
            self.config.storage.path = PathBuf::from(path);
        }
        if let Some(tenant) = get_env_with_prefix("TENANT") {
            self.config.storage.tenant = tenant;
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level is not one of trace, debug, info, warn, error
    /// - A trial length is 0 or longer than a year
    /// - The storage path is empty
    /// - The tenant is not a valid scope identifier
    pub fn build(self) -> Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(EntitlementsError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let trial = &self.config.trial;
        for (name, days) in [
            ("general_trial_days", trial.general_trial_days),
            ("buyer_trial_days", trial.buyer_trial_days),
        ] {
            if days == 0 || days > MAX_TRIAL_DAYS {
                return Err(EntitlementsError::config(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_TRIAL_DAYS, days
                )));
            }
        }

        if self.config.storage.path.as_os_str().is_empty() {
            return Err(EntitlementsError::config("Storage path cannot be empty"));
        }

        validate_tenant(&self.config.storage.tenant)?;

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
