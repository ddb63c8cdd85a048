//! Core functionality module
//!
//! Contains file watching, filtering, debouncing and event types

pub mod events;
pub mod filter;
pub mod debounce;
pub mod watcher;

// Re-export main types
pub use events::{FileEvent, Operation};
pub use filter::PathFilter;
pub use debounce::{Coalescer, DEFAULT_DEBOUNCE};
pub use watcher::{Watcher, WatcherHandle};
