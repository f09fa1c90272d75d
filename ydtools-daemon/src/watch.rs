//! File watch on the daemon log.
//!
//! Push notification (inotify/FSEvents) is tried first; if the platform
//! watcher cannot be created or refuses the path, a stat-polling watcher
//! takes over. Both forward raw events into the same channel.

use std::path::{Path, PathBuf};

use notify::{
    recommended_watcher, Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode,
    Watcher,
};
use tokio::sync::mpsc;

use crate::error::DaemonError;
use crate::paths::POLL_WATCH_INTERVAL;

pub type EventSender = mpsc::UnboundedSender<notify::Result<Event>>;

/// The watcher backing a [`LogWatch`].
pub enum EventSource {
    Push(RecommendedWatcher),
    Poll(PollWatcher),
}

impl EventSource {
    pub fn kind(&self) -> &'static str {
        match self {
            EventSource::Push(_) => "push",
            EventSource::Poll(_) => "poll",
        }
    }
}

/// An armed watch. Dropping it stops the watch.
pub struct LogWatch {
    source: EventSource,
    path: PathBuf,
}

impl std::fmt::Debug for LogWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWatch")
            .field("source", &self.source.kind())
            .field("path", &self.path)
            .finish()
    }
}

impl LogWatch {
    /// Watches `path`, picking the first source that accepts it.
    pub fn arm(path: &Path, events: EventSender) -> Result<Self, DaemonError> {
        let source = match push_source(path, events.clone()) {
            Ok(watcher) => EventSource::Push(watcher),
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "push watch unavailable, falling back to polling",
                );
                EventSource::Poll(poll_source(path, events)?)
            }
        };
        tracing::debug!(path = %path.display(), source = source.kind(), "log watch armed");
        Ok(Self {
            source,
            path: path.to_path_buf(),
        })
    }

    pub fn source(&self) -> &EventSource {
        &self.source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn push_source(path: &Path, events: EventSender) -> notify::Result<RecommendedWatcher> {
    let mut watcher = recommended_watcher(move |event| {
        let _ = events.send(event);
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn poll_source(path: &Path, events: EventSender) -> notify::Result<PollWatcher> {
    let mut watcher = PollWatcher::new(
        move |event| {
            let _ = events.send(event);
        },
        Config::default().with_poll_interval(POLL_WATCH_INTERVAL),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Creation or modification of the log; everything else is noise.
pub fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}
