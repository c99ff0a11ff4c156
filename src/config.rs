use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String,
    pub database: DatabaseConfig,
}

/// Data source settings. Credentials are injected into `url` when it has none.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default = "default_pool_name")]
    pub pool_name: String,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Extra vendor error codes treated as duplicate-key violations
    #[serde(default)]
    pub duplicate_key_codes: Vec<String>,
}

fn default_rotation() -> String {
    "never".to_string()
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_pool_name() -> String {
    "MyPool".to_string()
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl DatabaseConfig {
    /// Config with pool defaults for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            max_pool_size: default_max_pool_size(),
            pool_name: default_pool_name(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            duplicate_key_codes: Vec::new(),
        }
    }

    /// URL with `username`/`password` applied.
    ///
    /// Only URLs with an authority part (e.g. `postgres://host/db`) can carry
    /// credentials; anything else (`sqlite::memory:`) is returned unchanged.
    /// Credentials already present in the URL win over the configured ones.
    pub fn connection_url(&self) -> String {
        let Ok(mut parsed) = url::Url::parse(&self.url) else {
            return self.url.clone();
        };
        if parsed.cannot_be_a_base() || parsed.host().is_none() {
            return self.url.clone();
        }
        if parsed.username().is_empty()
            && let Some(username) = self.username.as_deref()
        {
            if parsed.set_username(username).is_err() {
                return self.url.clone();
            }
            if parsed.password().is_none()
                && let Some(password) = self.password.as_deref()
                && parsed.set_password(Some(password)).is_err()
            {
                return self.url.clone();
            }
        }
        parsed.to_string()
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}
