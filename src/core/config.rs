//! Configuration management for Axon
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/axon/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{AxonError, Result};

/// Main configuration for Axon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Event dispatcher configuration
    #[serde(default)]
    pub events: EventConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Agent loop behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning loop iterations before forcing a final answer
    /// Default: 10
    pub max_iterations: u32,
    /// Number of recent history entries included in each reasoning call
    /// Default: 6
    pub history_window: usize,
    /// Whether to show debug output
    pub debug: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: env_parse("AXON_MAX_ITERATIONS", 10),
            history_window: env_parse("AXON_HISTORY_WINDOW", 6),
            debug: env_flag("AXON_DEBUG"),
        }
    }
}

/// Tiered memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum short-term items held per conversation
    /// Default: 24
    pub short_term_capacity: usize,
    /// Maximum long-term items recalled per query
    /// Default: 5
    pub recall_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: env_parse("AXON_SHORT_TERM_CAPACITY", 24),
            recall_limit: env_parse("AXON_RECALL_LIMIT", 5),
        }
    }
}

/// Event dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Bounded event history capacity; oldest events are dropped beyond this
    /// Default: 200
    pub history_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            history_capacity: env_parse("AXON_EVENT_HISTORY", 200),
        }
    }
}

/// Timeouts at the external-collaborator boundaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Reasoning service call timeout in seconds
    pub reasoning_secs: u64,
    /// Tool execution timeout in seconds
    pub tool_secs: u64,
    /// How long a paused run waits for user input in seconds
    pub interaction_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            reasoning_secs: env_parse("AXON_REASONING_TIMEOUT", 60),
            tool_secs: env_parse("AXON_TOOL_TIMEOUT", 120),
            interaction_secs: env_parse("AXON_INTERACTION_TIMEOUT", 300),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            memory: MemoryConfig::default(),
            events: EventConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("axon")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Try to load from config file
        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(AxonError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| AxonError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AxonError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| AxonError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AxonError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| AxonError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Check if a config file exists
    pub fn config_exists() -> bool {
        Self::config_file().exists()
    }

    /// Reasoning call timeout as a Duration
    pub fn reasoning_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeouts.reasoning_secs)
    }

    /// Tool execution timeout as a Duration
    pub fn tool_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeouts.tool_secs)
    }

    /// Interactive-wait timeout as a Duration
    pub fn interaction_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeouts.interaction_secs)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|v| v == "true" || v == "1").unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
