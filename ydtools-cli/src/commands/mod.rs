pub mod control;
pub mod status;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use ydtools_core::paths::{default_daemon_config, expand_home};
use ydtools_core::AppSettings;
use ydtools_daemon::paths::DAEMON_BINARY;
use ydtools_daemon::DaemonController;

/// Daemon selection shared by the one-shot commands.
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// Daemon config file; defaults to the first configured daemon.
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<String>,

    /// Daemon executable name or path.
    #[arg(long, value_name = "BIN", default_value = DAEMON_BINARY)]
    pub daemon_bin: String,
}

impl DaemonArgs {
    /// The config path to act on, with `~` expanded.
    pub fn config_path(&self, home: &Path) -> PathBuf {
        match &self.config {
            Some(raw) => expand_home(raw, home),
            None => AppSettings::load(home)
                .daemons(home)
                .into_iter()
                .next()
                .unwrap_or_else(|| default_daemon_config(home)),
        }
    }

    pub fn controller(&self, home: &Path) -> Result<DaemonController> {
        let config = self.config_path(home);
        DaemonController::locate(&self.daemon_bin, config)
            .with_context(|| format!("cannot use daemon executable `{}`", self.daemon_bin))
    }
}

pub fn home() -> Result<PathBuf> {
    ydtools_core::paths::home().context("could not determine home directory")
}

/// Multi-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}
