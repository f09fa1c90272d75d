//! Messages for status transitions worth telling the user about.
//!
//! Only the decision lives here; showing them is up to the listener.

use std::fmt;

use serde::Serialize;

use crate::snapshot::{StatusKind, StatusSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    DaemonStarted,
    SyncStarted,
    SyncCompleted,
    SyncPaused,
    DaemonStopped,
    SyncError,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::DaemonStarted => "Yandex.Disk daemon has been started",
            Notice::SyncStarted => "Synchronization started",
            Notice::SyncCompleted => "Synchronization has been completed",
            Notice::SyncPaused => "Synchronization has been paused",
            Notice::DaemonStopped => "Yandex.Disk daemon has been stopped",
            Notice::SyncError => "Synchronization ERROR",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Notices for entering `status` from `last`. Empty when nothing moved.
pub fn notices(last: StatusKind, status: StatusKind) -> Vec<Notice> {
    use StatusKind as K;

    let mut out = Vec::new();
    if status == last {
        return out;
    }
    if last == K::None {
        out.push(Notice::DaemonStarted);
    }
    match status {
        K::Busy => out.push(Notice::SyncStarted),
        K::Idle if last == K::Busy => out.push(Notice::SyncCompleted),
        K::Idle => {}
        K::Paused if !matches!(last, K::None | K::Unknown) => out.push(Notice::SyncPaused),
        K::Paused => {}
        K::None if last != K::Unknown => out.push(Notice::DaemonStopped),
        K::None | K::Unknown => {}
        K::Error | K::NoNet => out.push(Notice::SyncError),
    }
    out
}

/// [`notices`] for the transition recorded in `snapshot`.
pub fn for_snapshot(snapshot: &StatusSnapshot) -> Vec<Notice> {
    notices(snapshot.last_status, snapshot.status)
}
