use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::config::AgentSpyConfig;

#[derive(Parser, Debug)]
#[command(name = "agent-spy")]
#[command(version)]
#[command(about = "Watch a project for file changes and show what changed")]
#[command(long_about = "agent-spy watches a directory tree, merges bursts of writes from editors, build tools and coding agents into one event per change, and diffs each change against git HEAD or the previously seen content.")]
pub struct Cli {
    /// Directory to watch for changes
    #[arg(value_name = "PATH", help = "Path to watch (defaults to current directory)")]
    pub path: Option<PathBuf>,

    /// Debounce interval in milliseconds
    #[arg(long, value_name = "MS", help = "Quiet period before a change is reported")]
    pub debounce: Option<u64>,

    /// Additional exclude patterns
    #[arg(long = "filter", value_name = "PATTERN", help = "Additional exclude pattern (repeatable; `dir/` or glob)")]
    pub filters: Vec<String>,

    /// Disable git integration
    #[arg(long, help = "Do not use git HEAD as the diff baseline")]
    pub no_git: bool,

    /// Append events to a log file
    #[arg(long, value_name = "FILE", help = "Write events to a log file")]
    pub log: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,

    /// Print diffs under each event in text mode
    #[arg(long, help = "Show the diff for each change")]
    pub diff: bool,

    /// Configuration file
    #[arg(long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable lines (default)
    Text,
    /// One JSON object per event, for scripting
    Json,
    /// Compact single-line format
    Compact,
}

impl Cli {
    pub fn get_watch_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Apply command-line flags on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut AgentSpyConfig) {
        if let Some(ms) = self.debounce {
            config.watcher.debounce_ms = ms;
        }
        config.watcher.filters.extend(self.filters.iter().cloned());
        if self.no_git {
            config.diff.use_git = false;
        }
        if let Some(log) = &self.log {
            config.output.log_file = Some(log.clone());
        }
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        let path = self.get_watch_path();

        if !path.exists() {
            return Err(format!("Path does not exist: {}", path.display()));
        }

        if !path.is_dir() {
            return Err(format!("Path is not a directory: {}", path.display()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "agent-spy",
            "/tmp",
            "--debounce",
            "200",
            "--filter",
            "*.log",
            "--filter",
            "coverage/",
            "--no-git",
            "--output",
            "json",
        ]);

        assert_eq!(cli.path, Some(PathBuf::from("/tmp")));
        assert_eq!(cli.debounce, Some(200));
        assert_eq!(cli.filters, vec!["*.log", "coverage/"]);
        assert!(cli.no_git);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_apply_to_config() {
        let cli = Cli::parse_from(["agent-spy", "--debounce", "50", "--filter", "*.tmp", "--log", "events.log"]);
        let mut config = AgentSpyConfig::default();
        config.watcher.filters.push("from-config/".to_string());

        cli.apply_to(&mut config);

        assert_eq!(config.watcher.debounce_ms, 50);
        assert_eq!(config.watcher.filters, vec!["from-config/", "*.tmp"]);
        assert!(config.diff.use_git);
        assert_eq!(config.output.log_file, Some(PathBuf::from("events.log")));
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["agent-spy"]);
        let mut config = AgentSpyConfig::default();

        cli.apply_to(&mut config);

        assert_eq!(config, AgentSpyConfig::default());
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_validate_rejects_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let cli = Cli::parse_from(["agent-spy", file.to_str().unwrap()]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["agent-spy", dir.path().to_str().unwrap()]);
        assert!(cli.validate().is_ok());
    }
}
