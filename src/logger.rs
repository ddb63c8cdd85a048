use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat};

use crate::core::FileEvent;
use crate::diff::DiffStats;

/// Append-only log of logical events, one line each:
/// `<RFC3339 time> <OP> <path>[ +<added> -<deleted>]`, with the time in the
/// local offset (`Z` when that offset is zero).
pub struct EventLogger<W: Write> {
    writer: W,
}

impl EventLogger<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> EventLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn log_event(&mut self, event: &FileEvent, stats: Option<&DiffStats>) -> io::Result<()> {
        writeln!(self.writer, "{}", format_line(event, stats))?;
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn format_line(event: &FileEvent, stats: Option<&DiffStats>) -> String {
    let time: DateTime<Local> = event.timestamp.into();
    let mut line = format!(
        "{} {} {}",
        time.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.op,
        event.path
    );
    if let Some(stats) = stats {
        line.push_str(&format!(" +{} -{}", stats.added, stats.deleted));
    }
    line
}
