//! Configuration management for agent-spy
//!
//! Defaults are overridden, in order, by an optional TOML file, by
//! `AGENT_SPY_*` environment variables and finally by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSpyConfig {
    /// File watcher configuration
    pub watcher: WatcherConfig,
    /// Diff engine configuration
    pub diff: DiffConfig,
    /// Output and event log configuration
    pub output: OutputConfig,
}

/// Configuration for file watching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period before a burst is flushed, in milliseconds. Zero means
    /// the built-in default.
    pub debounce_ms: u64,
    /// Capacity of the logical event queue
    pub queue_capacity: usize,
    /// Extra exclude patterns: `name/` for directories, globs otherwise
    pub filters: Vec<String>,
}

/// Configuration for diff generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Unchanged lines kept around each change
    pub context_lines: usize,
    /// Use git HEAD as the first baseline when a repository is found
    pub use_git: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Append-only event log
    pub log_file: Option<PathBuf>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            queue_capacity: 100,
            filters: Vec::new(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: 3,
            use_git: true,
        }
    }
}

impl WatcherConfig {
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl AgentSpyConfig {
    /// Load configuration from `path` if given, else use defaults, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override values from environment variables
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = lookup("AGENT_SPY_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.watcher.debounce_ms = ms;
        }

        if let Some(cap) = lookup("AGENT_SPY_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.watcher.queue_capacity = cap;
        }

        if let Some(lines) = lookup("AGENT_SPY_CONTEXT_LINES").and_then(|v| v.parse().ok()) {
            self.diff.context_lines = lines;
        }

        if let Some(val) = lookup("AGENT_SPY_NO_GIT") {
            if matches!(val.as_str(), "1" | "true" | "yes") {
                self.diff.use_git = false;
            }
        }

        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.watcher.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}
