//! TOML configuration with serde-backed defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::notify::DEFAULT_CLEANUP_MESSAGE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Seconds between countdown ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Seconds between committed-queue pulls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_cleanup_message")]
    pub cleanup_message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Display name attached to uploads.
    #[serde(default = "default_owner")]
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Where the committed queue is persisted across restarts.
    #[serde(default = "default_queue_file")]
    pub queue_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_tick_interval() -> u64 {
    1
}

fn default_poll_interval() -> u64 {
    30
}

fn default_cleanup_message() -> String {
    DEFAULT_CLEANUP_MESSAGE.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_owner() -> String {
    "anonymous".to_string()
}

fn default_queue_file() -> PathBuf {
    PathBuf::from("queue_files.json")
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            poll_interval_secs: default_poll_interval(),
            cleanup_message: default_cleanup_message(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            owner: default_owner(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            queue_file: default_queue_file(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            backend: BackendConfig::default(),
            storage: StorageConfig::default(),
            web: WebConfig::default(),
        }
    }
}

pub fn load_config(path: &std::path::Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}
