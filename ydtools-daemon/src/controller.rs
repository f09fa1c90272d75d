//! Invokes the `yandex-disk` executable.
//!
//! Every call goes through a [`CommandRunner`] so tests can script the
//! daemon. Failures are logged here and never returned: a failed `status`
//! reads as an empty output, which the parser treats as "not running".

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DaemonError;
use crate::paths::{tmp_dir, COMMAND_TIMEOUT};

/// One daemon invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Replacement environment; `None` inherits the caller's.
    pub env: Option<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr joined, for log messages.
    pub fn message(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_owned()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Runs invocations as real subprocesses, killed after a timeout.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }
}

impl SystemRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(env) = &invocation.env {
            cmd.env_clear().envs(env.iter().map(|(k, v)| (k, v)));
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer within {:?}", self.timeout),
                )
            })??;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Handle on one daemon instance, identified by its config file.
#[derive(Clone)]
pub struct DaemonController {
    binary: PathBuf,
    config_path: PathBuf,
    tmp_dir: String,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for DaemonController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonController")
            .field("binary", &self.binary)
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

impl DaemonController {
    /// Finds `binary` on `PATH` and binds it to `config_path`.
    pub fn locate(binary: &str, config_path: impl Into<PathBuf>) -> Result<Self, DaemonError> {
        let resolved = which::which(binary).map_err(|source| DaemonError::NotInstalled {
            binary: binary.to_owned(),
            source,
        })?;
        tracing::debug!(binary = %resolved.display(), "daemon executable found");
        Ok(Self::with_runner(
            resolved,
            config_path,
            Arc::new(SystemRunner::default()),
        ))
    }

    pub fn with_runner(
        binary: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
            tmp_dir: tmp_dir(),
            runner,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn invocation(&self, action: &str) -> Invocation {
        Invocation {
            program: self.binary.clone(),
            args: vec![
                "-c".to_owned(),
                self.config_path.display().to_string(),
                action.to_owned(),
            ],
            env: None,
        }
    }

    /// Output of `status`, or `""` when the daemon is down or misbehaves.
    ///
    /// Without `user_locale` the daemon runs with a clean English
    /// environment so the labels match what the parser expects.
    pub async fn query(&self, user_locale: bool) -> String {
        let mut invocation = self.invocation("status");
        if !user_locale {
            invocation.env = Some(vec![
                ("LANG".to_owned(), "en_US.UTF-8".to_owned()),
                ("TMPDIR".to_owned(), self.tmp_dir.clone()),
            ]);
        }
        match self.runner.run(&invocation).await {
            Ok(output) if output.success => output.stdout,
            Ok(output) => {
                tracing::debug!(message = %output.message(), "status query failed");
                String::new()
            }
            Err(err) => {
                tracing::debug!(error = %err, "status query failed");
                String::new()
            }
        }
    }

    /// Starts the daemon unless it already runs.
    ///
    /// Returns `true` when the daemon runs afterwards.
    pub async fn start(&self) -> bool {
        if !self.query(false).await.is_empty() {
            tracing::info!(config = %self.config_path.display(), "daemon is already started");
            return true;
        }
        match self.runner.run(&self.invocation("start")).await {
            Ok(output) if output.success => {
                tracing::info!(message = %output.message(), "daemon start succeeded");
                true
            }
            Ok(output) => {
                tracing::error!(message = %output.message(), "daemon start failed");
                false
            }
            Err(err) => {
                tracing::error!(error = %err, "daemon start failed");
                false
            }
        }
    }

    /// Stops the daemon if it runs.
    ///
    /// Returns `true` when a `stop` was issued and succeeded.
    pub async fn stop(&self) -> bool {
        if self.query(false).await.is_empty() {
            tracing::info!(config = %self.config_path.display(), "daemon is not started");
            return false;
        }
        match self.runner.run(&self.invocation("stop")).await {
            Ok(output) if output.success => {
                tracing::info!(message = %output.message(), "daemon stop succeeded");
                true
            }
            Ok(output) => {
                tracing::warn!(message = %output.message(), "daemon stop failed");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "daemon stop failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted daemon: answers `status` with a settable text and records calls.
    #[derive(Default)]
    pub(crate) struct FakeDaemon {
        pub status: Mutex<String>,
        pub fail_actions: Mutex<bool>,
        pub calls: Mutex<Vec<(tokio::time::Instant, Invocation)>>,
        /// How long each `status` call takes.
        pub status_delay: Mutex<Duration>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeDaemon {
        pub fn running(status: &str) -> Arc<Self> {
            let fake = Self::default();
            *fake.status.lock().unwrap() = status.to_owned();
            Arc::new(fake)
        }

        pub fn set_status(&self, status: &str) {
            *self.status.lock().unwrap() = status.to_owned();
        }

        /// Most `status` calls ever in flight at once.
        pub fn peak_concurrent_status(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn actions(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(_, inv)| inv.args.last().cloned())
                .collect()
        }

        pub fn status_times(&self) -> Vec<tokio::time::Instant> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, inv)| inv.args.last().map(String::as_str) == Some("status"))
                .map(|(at, _)| *at)
                .collect()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeDaemon {
        async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((tokio::time::Instant::now(), invocation.clone()));
            let action = invocation.args.last().map(String::as_str).unwrap_or_default();
            let output = match action {
                "status" => {
                    let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(active, Ordering::SeqCst);
                    let delay = *self.status_delay.lock().unwrap();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    self.active.fetch_sub(1, Ordering::SeqCst);
                    let status = self.status.lock().unwrap().clone();
                    CommandOutput {
                        success: !status.is_empty(),
                        stdout: status,
                        stderr: String::new(),
                    }
                }
                "start" | "stop" => CommandOutput {
                    success: !*self.fail_actions.lock().unwrap(),
                    stdout: format!("{action} done\n"),
                    stderr: String::new(),
                },
                other => {
                    return Err(io::Error::new(io::ErrorKind::InvalidInput, other.to_owned()))
                }
            };
            Ok(output)
        }
    }

    fn controller(fake: &Arc<FakeDaemon>) -> DaemonController {
        DaemonController::with_runner("/usr/bin/yandex-disk", "/cfg/config.cfg", fake.clone())
    }

    #[tokio::test]
    async fn query_uses_clean_english_environment() {
        let fake = FakeDaemon::running("Synchronization core status: idle\n");
        let output = controller(&fake).query(false).await;

        assert_eq!(output, "Synchronization core status: idle\n");
        let calls = fake.calls.lock().unwrap();
        let (_, inv) = &calls[0];
        assert_eq!(inv.args, vec!["-c", "/cfg/config.cfg", "status"]);
        let env = inv.env.as_ref().expect("environment replaced");
        assert!(env.contains(&("LANG".to_owned(), "en_US.UTF-8".to_owned())));
        assert!(env.iter().any(|(k, _)| k == "TMPDIR"));
    }

    #[tokio::test]
    async fn query_with_user_locale_inherits_environment() {
        let fake = FakeDaemon::running("x: y\n");
        controller(&fake).query(true).await;
        assert!(fake.calls.lock().unwrap()[0].1.env.is_none());
    }

    #[tokio::test]
    async fn failed_query_reads_as_empty() {
        let fake = FakeDaemon::running("");
        assert_eq!(controller(&fake).query(false).await, "");
    }

    #[tokio::test]
    async fn start_is_skipped_when_already_running() {
        let fake = FakeDaemon::running("Synchronization core status: idle\n");
        assert!(controller(&fake).start().await);
        assert_eq!(fake.actions(), vec!["status"]);
    }

    #[tokio::test]
    async fn start_runs_daemon_when_down() {
        let fake = FakeDaemon::running("");
        assert!(controller(&fake).start().await);
        assert_eq!(fake.actions(), vec!["status", "start"]);
    }

    #[tokio::test]
    async fn failed_start_is_reported_not_raised() {
        let fake = FakeDaemon::running("");
        *fake.fail_actions.lock().unwrap() = true;
        assert!(!controller(&fake).start().await);
    }

    #[tokio::test]
    async fn stop_is_skipped_when_down() {
        let fake = FakeDaemon::running("");
        assert!(!controller(&fake).stop().await);
        assert_eq!(fake.actions(), vec!["status"]);

        fake.set_status("Synchronization core status: idle\n");
        assert!(controller(&fake).stop().await);
        assert_eq!(fake.actions(), vec!["status", "status", "stop"]);
    }

    #[test]
    fn locate_missing_binary_is_not_installed() {
        let err = DaemonController::locate("ydtools-no-such-daemon-binary", "/cfg").unwrap_err();
        assert!(matches!(err, DaemonError::NotInstalled { .. }), "got: {err}");
    }
}
