use std::path::{Path, PathBuf};
use std::time::Duration;

use ydtools_core::paths::expand_home;

/// Executable looked up on `PATH`.
pub const DAEMON_BINARY: &str = "yandex-disk";

/// Log the daemon appends to on every sync step, relative to the synced dir.
pub const SYNC_LOG: &str = ".sync/cli.log";

/// Delay of the first status query after launch.
pub const STARTUP_DELAY: Duration = Duration::from_millis(500);
/// Shortest polling interval; also used right after a watch event.
pub const MIN_POLL_DELAY: Duration = Duration::from_secs(2);
/// Number of one-second steps the polling interval may grow by.
pub const MAX_BACKOFF_STEPS: u32 = 9;
/// Scan granularity of the stat-polling watch fallback.
pub const POLL_WATCH_INTERVAL: Duration = Duration::from_millis(600);
/// Upper bound for any single daemon invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// `<dir>/.sync/cli.log`, with a leading `~` in `dir` expanded.
pub fn sync_log_path(dir: &str, home: &Path) -> PathBuf {
    expand_home(dir, home).join(SYNC_LOG)
}

/// `$TMPDIR`, falling back to `/tmp`.
pub fn tmp_dir() -> String {
    std::env::var("TMPDIR")
        .ok()
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| "/tmp".to_owned())
}
