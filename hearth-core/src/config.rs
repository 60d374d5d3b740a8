//! Configuration types for Hearth

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compactor::CompactorConfig;
use crate::error::HearthError;

/// System prompt applied when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a story teller AI. Your task is to create engaging and imaginative stories based on user prompts";

/// Main configuration for Hearth
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Conversation and audit log storage
    pub storage: StorageConfig,

    /// Model backend and sampling parameters
    pub model: ModelConfig,

    /// Automatic conversation compaction
    pub compaction: CompactionConfig,

    /// Audit logging
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path holding the `messages` and `logs` tables
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("chat.db"),
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name
    pub model: String,

    /// Base URL for the model server (None uses the client default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature (0.0-1.5)
    pub temperature: f32,

    /// Nucleus sampling cutoff (0.0-1.0)
    pub top_p: f32,

    /// Sampling seed
    pub seed: i64,

    /// System prompt applied at runtime, never persisted into history
    pub system_prompt: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "llama3:8b".to_string(),
            base_url: None,
            temperature: 0.3,
            top_p: 0.9,
            seed: 42,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Compaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Enable automatic compaction of long conversations
    pub enabled: bool,

    /// Thresholds and deadline for the compactor
    #[serde(flatten)]
    pub settings: CompactorConfig,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: CompactorConfig::default(),
        }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable the audit log
    pub enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl HearthConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (hearth.toml or path from HEARTH_CONFIG_PATH)
    /// 3. Environment variable overrides (HEARTH_ prefix)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is invalid or a value fails
    /// validation.
    pub fn load() -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new()
            .merge(Toml::file("hearth.toml"))
            .merge(Env::prefixed("HEARTH_").split("_"));

        if let Ok(path) = std::env::var("HEARTH_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: HearthConfig = figment.extract().map_err(|e| {
            HearthError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Toml},
        };

        let config: HearthConfig = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                HearthError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.compaction.settings.validate()?;

        if self.model.model.is_empty() {
            return Err(HearthError::Configuration(
                "model name must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.5).contains(&self.model.temperature) {
            return Err(HearthError::Configuration(format!(
                "temperature out of range (0.0-1.5): {}",
                self.model.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.model.top_p) {
            return Err(HearthError::Configuration(format!(
                "top_p out of range (0.0-1.0): {}",
                self.model.top_p
            )));
        }

        Ok(())
    }
}
