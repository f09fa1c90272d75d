//! Status model for one monitored daemon.

use std::fmt;

use serde::Serialize;

use crate::normalize::{normalize, or_placeholder, PLACEHOLDER};
use crate::parser::ParsedOutput;

// ---------------------------------------------------------------------------
// StatusKind
// ---------------------------------------------------------------------------

/// Canonical daemon status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Nothing has been queried yet.
    Unknown,
    /// The daemon is not running.
    None,
    Idle,
    Busy,
    Paused,
    /// `no internet access`
    NoNet,
    /// Any other daemon status.
    Error,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Unknown => "unknown",
            StatusKind::None => "none",
            StatusKind::Idle => "idle",
            StatusKind::Busy => "busy",
            StatusKind::Paused => "paused",
            StatusKind::NoNet => "no_net",
            StatusKind::Error => "error",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Which groups of fields changed in the last cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// `status` or `progress`.
    pub status: bool,
    /// `total`, `used`, `free`, `trash`, `error` or `path`.
    pub sizes: bool,
    /// The list of last synchronized items.
    pub items: bool,
}

impl ChangeSet {
    pub fn all() -> Self {
        Self {
            status: true,
            sizes: true,
            items: true,
        }
    }

    pub fn any(&self) -> bool {
        self.status || self.sizes || self.items
    }
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Latest known state of a daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: StatusKind,
    pub last_status: StatusKind,
    pub progress: String,
    pub total: String,
    pub used: String,
    pub free: String,
    pub trash: String,
    pub error: String,
    pub path: String,
    pub last_items: Vec<String>,
    pub changes: ChangeSet,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: StatusKind::Unknown,
            last_status: StatusKind::Unknown,
            progress: String::new(),
            total: PLACEHOLDER.to_owned(),
            used: PLACEHOLDER.to_owned(),
            free: PLACEHOLDER.to_owned(),
            trash: PLACEHOLDER.to_owned(),
            error: String::new(),
            path: String::new(),
            last_items: Vec::new(),
            changes: ChangeSet::all(),
        }
    }
}

impl StatusSnapshot {
    /// Snapshot before the first query: everything unknown, everything changed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one parsed output into the snapshot and records what changed.
    ///
    /// `last_status` always becomes the previous `status`, even when the
    /// status itself does not change.
    pub fn apply(&mut self, parsed: &ParsedOutput) -> ChangeSet {
        let mut changes = ChangeSet::default();

        self.last_status = self.status;
        let status = normalize(&parsed.status, self.last_status);
        changes.status |= replace(&mut self.status, status);
        changes.status |= replace(&mut self.progress, parsed.progress.clone());

        for (slot, raw) in [
            (&mut self.total, &parsed.total),
            (&mut self.used, &parsed.used),
            (&mut self.free, &parsed.free),
            (&mut self.trash, &parsed.trash),
            (&mut self.error, &parsed.error),
            (&mut self.path, &parsed.path),
        ] {
            changes.sizes |= replace(slot, or_placeholder(raw));
        }

        if self.last_items != parsed.items {
            self.last_items = parsed.items.clone();
            changes.items = true;
        }

        self.changes = changes;
        changes
    }
}

/// Stores `new` in `slot`; `true` when it differed.
fn replace<T: PartialEq>(slot: &mut T, new: T) -> bool {
    if *slot == new {
        return false;
    }
    *slot = new;
    true
}
