//! Configuration management for Autogram
//!
//! All tunables live in one TOML file and are passed into constructors as
//! explicit structs; core logic never reads the environment directly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub generation: Option<GenerationConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Tunables for the publish orchestrator and Graph API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    #[serde(default = "default_status_poll_interval")]
    pub status_poll_interval_secs: u64,
    #[serde(default = "default_status_poll_attempts")]
    pub status_poll_attempts: u32,
    #[serde(default = "default_inter_post_delay")]
    pub inter_post_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub verify_images: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            graph_api_base: default_graph_api_base(),
            max_retries: default_max_retries(),
            status_poll_interval_secs: default_status_poll_interval(),
            status_poll_attempts: default_status_poll_attempts(),
            inter_post_delay_secs: default_inter_post_delay(),
            request_timeout_secs: default_request_timeout(),
            verify_images: false,
        }
    }
}

impl PublisherConfig {
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }

    pub fn inter_post_delay(&self) -> Duration {
        Duration::from_secs(self.inter_post_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between publish ticks. Faster wastes API quota, slower adds
    /// publish latency.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds between post-generation passes over active schedules.
    #[serde(default = "default_generation_interval")]
    pub generation_interval_secs: u64,
    /// Age after which an in_progress claim is considered abandoned.
    #[serde(default = "default_stale_claim")]
    pub stale_claim_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            generation_interval_secs: default_generation_interval(),
            stale_claim_secs: default_stale_claim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub caption_api_base: String,
    pub caption_api_key: String,
    #[serde(default = "default_caption_model")]
    pub caption_model: String,
    pub image_api_base: String,
    pub image_api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub api_base: String,
    pub bucket: String,
    pub api_key: String,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v24.0".to_string()
}

fn default_max_retries() -> i64 {
    3
}

fn default_status_poll_interval() -> u64 {
    3
}

fn default_status_poll_attempts() -> u32 {
    20
}

fn default_inter_post_delay() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    60
}

fn default_generation_interval() -> u64 {
    900
}

fn default_stale_claim() -> i64 {
    600
}

fn default_caption_model() -> String {
    "sonar".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/autogram/autogram.db".to_string(),
            },
            publisher: PublisherConfig::default(),
            scheduler: SchedulerConfig::default(),
            generation: None,
            storage: None,
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AUTOGRAM_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("autogram").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("autogram"))
}
