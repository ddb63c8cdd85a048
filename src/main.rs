use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;

use agent_spy::{
    cli::{Cli, OutputFormat},
    AgentSpyConfig, BaselineSource, DiffEngine, DiffFormatter, DiffResult, DiffStats,
    EventLogger, FileEvent, GitRepo, Operation, Watcher,
};

/// Hunk lines shown per event with `--diff`.
const MAX_DIFF_LINES: usize = 40;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let mut config = AgentSpyConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    let watch_path = cli.get_watch_path();
    let watch_path = watch_path.canonicalize().unwrap_or(watch_path);
    tracing::info!("Starting agent-spy on: {}", watch_path.display());

    let repo = if config.diff.use_git {
        GitRepo::discover(&watch_path)
    } else {
        None
    };
    let branch = repo.as_ref().and_then(GitRepo::branch);

    if let Some(repo) = &repo {
        let mut filters = repo.ignore_patterns();
        filters.append(&mut config.watcher.filters);
        config.watcher.filters = filters;
    }

    let engine = match repo {
        Some(repo) => DiffEngine::new(&watch_path, repo),
        None => DiffEngine::without_baseline(&watch_path),
    }
    .with_context_lines(config.diff.context_lines);

    let logger = match &config.output.log_file {
        Some(path) => Some(EventLogger::append_to(path)?),
        None => None,
    };

    let (event_tx, event_rx) = mpsc::channel(config.watcher.queue_capacity);
    let watcher = Watcher::new(&watch_path, event_tx, &config.watcher)?;

    let handle = watcher.handle();
    ctrlc::set_handler(move || handle.close()).context("Failed to install Ctrl-C handler")?;

    let printer = Printer {
        format: cli.output,
        show_diff: cli.diff,
        color: !cli.no_color,
    };

    if printer.format == OutputFormat::Text {
        println!("Watching: {}", watch_path.display());
        if let Some(branch) = &branch {
            println!("Branch: {}", branch);
        }
        println!("Press Ctrl+C to quit");
        println!("---");
    }

    let engine = Arc::new(engine);
    let watch_task = watcher.start();
    let consumer = tokio::task::spawn_blocking(move || consume(event_rx, engine, printer, logger));

    watch_task.await.context("Watcher task failed")?;
    consumer.await.context("Event consumer failed")?
}

/// Diff and print events until the queue closes.
fn consume(
    mut events: mpsc::Receiver<FileEvent>,
    engine: Arc<DiffEngine>,
    printer: Printer,
    mut logger: Option<EventLogger<File>>,
) -> Result<()> {
    while let Some(event) = events.blocking_recv() {
        let diff = engine.diff(&event.path);
        let stats = diff.available.then_some(&diff.stats);

        if let Some(logger) = logger.as_mut() {
            if let Err(err) = logger.log_event(&event, stats) {
                tracing::warn!("Failed to write event log: {}", err);
            }
        }

        printer.print(&event, &diff)?;
    }

    Ok(())
}

struct Printer {
    format: OutputFormat,
    show_diff: bool,
    color: bool,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: DateTime<Utc>,
    op: Operation,
    path: &'a str,
    changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a DiffStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff_error: Option<&'a str>,
}

impl Printer {
    fn print(&self, event: &FileEvent, diff: &DiffResult) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.print_text(event, diff),
            OutputFormat::Json => {
                let record = JsonRecord {
                    timestamp: event.timestamp.into(),
                    op: event.op,
                    path: &event.path,
                    changes: event.change_count(),
                    stats: diff.available.then_some(&diff.stats),
                    diff_error: diff.error(),
                };
                println!("{}", serde_json::to_string(&record)?);
            }
            OutputFormat::Compact => println!("{} {}", event.op.symbol(), event.path),
        }
        Ok(())
    }

    fn print_text(&self, event: &FileEvent, diff: &DiffResult) {
        let time: DateTime<Local> = event.timestamp.into();
        let time_str = time.format("%H:%M:%S");

        let mut suffix = String::new();
        if diff.available {
            suffix.push_str(&format!(" ({})", DiffFormatter::format_stats(diff)));
        }
        if event.is_debounced() {
            suffix.push_str(&format!(" [x{}]", event.change_count()));
        }

        if self.color {
            let color = match event.op {
                Operation::Create => "\x1b[32m", // Green
                Operation::Modify => "\x1b[33m", // Yellow
                Operation::Delete => "\x1b[31m", // Red
                Operation::Rename => "\x1b[34m", // Blue
            };
            println!("[{}] {}{}\x1b[0m {}{}", time_str, color, event.op, event.path, suffix);
        } else {
            println!("[{}] {} {}{}", time_str, event.op, event.path, suffix);
        }

        if self.show_diff && diff.available {
            if self.color {
                for line in DiffFormatter::format_colored(diff, MAX_DIFF_LINES) {
                    println!("  {}", line);
                }
            } else {
                for line in DiffFormatter::format_unified(diff, &event.path).lines().skip(2) {
                    println!("  {}", line);
                }
            }
            println!();
        }
    }
}
