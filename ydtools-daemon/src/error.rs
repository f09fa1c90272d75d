use std::path::PathBuf;

use thiserror::Error;

/// Error surface for monitor setup and the trigger tasks.
///
/// Subprocess failures never show up here: the controller logs them and
/// reports an empty output instead.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("`{binary}` is not installed; install the Yandex.Disk daemon first")]
    NotInstalled {
        binary: String,
        #[source]
        source: which::Error,
    },

    #[error("daemon is not configured (config: {config})")]
    NotConfigured { config: PathBuf },

    #[error("{task} task join failure: {message}")]
    TaskJoin { task: &'static str, message: String },
}
