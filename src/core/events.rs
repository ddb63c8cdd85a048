use std::fmt;
use std::time::SystemTime;
use serde::{Deserialize, Serialize};

/// Kind of change observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Modify,
    Delete,
    Rename,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::Rename => "RENAME",
        }
    }

    /// Single character marker used by compact output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Modify => "M",
            Self::Delete => "D",
            Self::Rename => "R",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical change on one path.
///
/// Raw notifications are wrapped in a `FileEvent` before they reach the
/// coalescer; the coalescer emits one `FileEvent` per burst whose
/// `sub_events` carries the raw burst when it held more than one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEvent {
    /// Root-relative path, `/` separated.
    pub path: String,
    pub op: Operation,
    pub timestamp: SystemTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_events: Vec<FileEvent>,
}

impl FileEvent {
    pub fn new(path: impl Into<String>, op: Operation) -> Self {
        Self {
            path: path.into(),
            op,
            timestamp: SystemTime::now(),
            sub_events: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_sub_events(mut self, sub_events: Vec<FileEvent>) -> Self {
        self.sub_events = sub_events;
        self
    }

    pub fn is_debounced(&self) -> bool {
        self.sub_events.len() > 1
    }

    pub fn change_count(&self) -> usize {
        self.sub_events.len().max(1)
    }
}
