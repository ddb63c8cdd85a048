//! Per-path burst coalescing.
//!
//! Every raw event for a path either opens a burst or joins the open one and
//! pushes its flush deadline back by the debounce window. A burst is flushed
//! as a single [`FileEvent`] once its path has been quiet for the whole
//! window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::events::{FileEvent, Operation};

/// Debounce window used when none (or zero) is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

struct PendingBurst {
    events: Vec<FileEvent>,
    deadline: Instant,
}

struct Shared {
    pending: Mutex<HashMap<String, PendingBurst>>,
    debounce: Duration,
    output: mpsc::Sender<FileEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingBurst>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Merges bursts of raw events into logical events.
///
/// Cloning is cheap; clones share the same pending map and output queue.
#[derive(Clone)]
pub struct Coalescer {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl Coalescer {
    /// Create a coalescer whose timers run on `runtime`.
    pub fn new(runtime: Handle, output: mpsc::Sender<FileEvent>, debounce: Duration) -> Self {
        let debounce = if debounce.is_zero() { DEFAULT_DEBOUNCE } else { debounce };

        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                debounce,
                output,
            }),
            runtime,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    /// Number of paths with an open burst.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().len()
    }

    /// Buffer a raw event, opening a burst for its path if none is open.
    pub fn push(&self, event: FileEvent) {
        let deadline = Instant::now() + self.shared.debounce;
        let mut pending = self.shared.lock();

        if let Some(burst) = pending.get_mut(&event.path) {
            burst.events.push(event);
            burst.deadline = deadline;
            return;
        }

        let key = event.path.clone();
        pending.insert(
            key.clone(),
            PendingBurst {
                events: vec![event],
                deadline,
            },
        );
        drop(pending);

        self.runtime.spawn(flush_when_quiet(Arc::clone(&self.shared), key, deadline));
    }
}

/// Timer task for one burst. Sleeps until the burst's deadline, re-arming
/// while new events keep moving it, then takes the burst out of the map and
/// emits it.
async fn flush_when_quiet(shared: Arc<Shared>, key: String, mut deadline: Instant) {
    let events = loop {
        sleep_until(deadline).await;

        match take_if_due(&shared, &key) {
            Due::Ready(events) => break events,
            Due::Later(next) => deadline = next,
            Due::Gone => return,
        }
    };

    let Some(event) = merge_burst(events) else {
        return;
    };

    tracing::debug!(
        "Flushing {} {} ({} raw events)",
        event.op,
        event.path,
        event.change_count()
    );

    if shared.output.send(event).await.is_err() {
        tracing::debug!("Event queue closed, dropping coalesced event for {}", key);
    }
}

enum Due {
    Ready(Vec<FileEvent>),
    Later(Instant),
    Gone,
}

/// Remove the burst for `key` if its deadline has passed. Removal happens
/// under the lock, so an event arriving afterwards opens a fresh burst.
fn take_if_due(shared: &Shared, key: &str) -> Due {
    let mut pending = shared.lock();

    match pending.get(key) {
        None => return Due::Gone,
        Some(burst) if burst.deadline > Instant::now() => return Due::Later(burst.deadline),
        Some(_) => {}
    }

    match pending.remove(key) {
        Some(burst) => Due::Ready(burst.events),
        None => Due::Gone,
    }
}

/// Collapse a burst into one event: path and timestamp of the last raw
/// event, `Create` if any raw event was a creation, otherwise the last op.
pub fn merge_burst(events: Vec<FileEvent>) -> Option<FileEvent> {
    let last = events.last()?;

    let op = if events.iter().any(|ev| ev.op == Operation::Create) {
        Operation::Create
    } else {
        last.op
    };

    let merged = FileEvent::new(last.path.clone(), op).with_timestamp(last.timestamp);

    if events.len() > 1 {
        Some(merged.with_sub_events(events))
    } else {
        Some(merged)
    }
}
