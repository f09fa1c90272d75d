//! `ydtools watch`: follow one or more daemons until interrupted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::mpsc;

use ydtools_core::AppSettings;
use ydtools_daemon::paths::DAEMON_BINARY;
use ydtools_daemon::{DaemonController, Monitor, Recovery};
use ydtools_status::{notice, StatusSnapshot};

use super::status::render;
use super::{home, runtime};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Add a daemon config file to the monitored set (repeatable).
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Vec<String>,

    /// Remove a daemon config file from the monitored set (repeatable).
    #[arg(long, short = 'r', value_name = "PATH")]
    pub remove: Vec<String>,

    /// Daemon executable name or path.
    #[arg(long, value_name = "BIN", default_value = DAEMON_BINARY)]
    pub daemon_bin: String,

    /// Exit after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let mut settings = AppSettings::load(&home);
        for raw in &self.config {
            if settings.add_daemon(raw) {
                tracing::info!(config = %raw, "daemon added");
            }
        }
        for raw in &self.remove {
            if !settings.remove_daemon(raw) {
                tracing::warn!(config = %raw, "daemon is not in the list");
            }
        }
        settings
            .save_if_changed()
            .with_context(|| format!("failed to save {}", settings.path().display()))?;

        let daemons = settings.daemons(&home);
        if daemons.is_empty() {
            bail!("no daemons specified; check the --config and --remove options");
        }
        runtime()?.block_on(self.watch(&home, &settings, daemons))
    }

    async fn watch(&self, home: &Path, settings: &AppSettings, daemons: Vec<PathBuf>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, StatusSnapshot)>();
        let multi = daemons.len() > 1;

        let mut monitors = Vec::with_capacity(daemons.len());
        for (n, config) in daemons.into_iter().enumerate() {
            let identity = if multi { format!("#{} ", n + 1) } else { String::new() };
            let controller = DaemonController::locate(&self.daemon_bin, &config)
                .with_context(|| format!("cannot use daemon executable `{}`", self.daemon_bin))?;

            let listener = {
                let tx = tx.clone();
                let identity = identity.clone();
                move |snapshot: &StatusSnapshot| {
                    let _ = tx.send((identity.clone(), snapshot.clone()));
                }
            };
            let mut setup = |path: &Path| {
                tracing::error!(
                    config = %path.display(),
                    "daemon is not configured; run `yandex-disk setup` first",
                );
                Recovery::Abort
            };

            match Monitor::launch(controller, home, identity.clone(), listener, &mut setup).await {
                Ok(monitor) => monitors.push(monitor),
                Err(err) if multi => {
                    tracing::error!(daemon = %identity, error = %err, "daemon skipped");
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("cannot monitor daemon {}", config.display()))
                }
            }
        }
        if monitors.is_empty() {
            bail!("none of the configured daemons can be monitored");
        }
        drop(tx);

        let notifications = settings.notifications();
        let deadline = async {
            match self.timeout {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                signal = tokio::signal::ctrl_c() => {
                    signal.context("ctrl-c handler failed")?;
                    tracing::info!("received ctrl-c, shutting down");
                    break;
                }
                update = rx.recv() => {
                    let Some((identity, snapshot)) = update else { break };
                    print!("{}", render(&snapshot, &identity, snapshot.changes));
                    if notifications {
                        for notice in notice::for_snapshot(&snapshot) {
                            println!("{identity}Notice: {notice}");
                        }
                    }
                }
            }
        }

        for monitor in monitors {
            monitor.exit().await.context("monitor shutdown failed")?;
        }
        Ok(())
    }
}
