pub mod cli;
pub mod config;
pub mod core;
pub mod diff;
pub mod git;
pub mod logger;

pub use crate::core::*;
pub use crate::diff::*;
pub use config::{AgentSpyConfig, DiffConfig, OutputConfig, WatcherConfig};
pub use git::{BaselineSource, GitRepo, NoBaseline};
pub use logger::EventLogger;
