//! Engine configuration: serde struct with defaults, loadable from TOML and
//! overridable per-field from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Tunables for the dialogue engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many requirement suggestions to request from the generation service
    #[serde(default = "default_suggestion_count")]
    pub suggestion_count: usize,
    /// Minimum token-overlap similarity for fuzzy solution-path selection
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// How many retrieved passages to surface per stage
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    /// SQLite database path for the persistent store backend
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_suggestion_count() -> usize {
    5
}

fn default_similarity_threshold() -> f64 {
    0.4
}

fn default_retrieval_top_k() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suggestion_count: default_suggestion_count(),
            similarity_threshold: default_similarity_threshold(),
            retrieval_top_k: default_retrieval_top_k(),
            database_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Override individual fields from `ETP_`-prefixed environment variables.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<usize>("ETP_SUGGESTION_COUNT") {
            self.suggestion_count = v;
        }
        if let Some(v) = env_parse::<f64>("ETP_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("ETP_RETRIEVAL_TOP_K") {
            self.retrieval_top_k = v;
        }
        if let Ok(v) = std::env::var("ETP_DATABASE_PATH") {
            if !v.trim().is_empty() {
                self.database_path = Some(v);
            }
        }
    }

    /// Default config, then the file named by `ETP_ENGINE_CONFIG` if set,
    /// then environment overrides.
    pub fn load() -> Self {
        let mut config = match std::env::var("ETP_ENGINE_CONFIG") {
            Ok(path) => match Self::from_toml_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("config file '{path}' ignored: {e}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("env override {key}={value} is not valid, keeping default");
            None
        }
    }
}
