use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use notify::Event;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use ydtools_core::DaemonConfig;
use ydtools_status::{parse, StatusKind, StatusSnapshot};

use crate::backoff::Backoff;
use crate::controller::DaemonController;
use crate::error::DaemonError;
use crate::paths::{sync_log_path, STARTUP_DELAY};
use crate::watch::{is_relevant_event_kind, LogWatch};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Receives the full snapshot whenever a cycle changed something.
///
/// Called while the pipeline lock is held, so it must not block.
pub trait StatusListener: Send + Sync + 'static {
    fn on_change(&self, snapshot: &StatusSnapshot);
}

impl<F> StatusListener for F
where
    F: Fn(&StatusSnapshot) + Send + Sync + 'static,
{
    fn on_change(&self, snapshot: &StatusSnapshot) {
        self(snapshot)
    }
}

impl StatusListener for mpsc::UnboundedSender<StatusSnapshot> {
    fn on_change(&self, snapshot: &StatusSnapshot) {
        if self.send(snapshot.clone()).is_err() {
            tracing::debug!("status receiver dropped");
        }
    }
}

/// What to do when the daemon configuration does not check out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Check the configuration again (after the user fixed it).
    Retry,
    /// Give up on this daemon.
    Abort,
}

pub trait SetupHandler {
    fn config_error(&mut self, config: &Path) -> Recovery;
}

impl<F> SetupHandler for F
where
    F: FnMut(&Path) -> Recovery,
{
    fn config_error(&mut self, config: &Path) -> Recovery {
        self(config)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    Watch,
}

impl Trigger {
    fn label(self) -> &'static str {
        match self {
            Trigger::Timer => "timer",
            Trigger::Watch => "watch",
        }
    }
}

struct Pipeline {
    snapshot: StatusSnapshot,
    backoff: Backoff,
}

struct Inner {
    identity: String,
    controller: DaemonController,
    config: DaemonConfig,
    log_path: Option<PathBuf>,
    listener: Box<dyn StatusListener>,
    pipeline: Mutex<Pipeline>,
    watch: StdMutex<Option<LogWatch>>,
    events: mpsc::UnboundedSender<notify::Result<Event>>,
    rearm: Notify,
}

/// Keeps one daemon's [`StatusSnapshot`] current.
///
/// A timer task polls with an adaptive interval and a watch task reacts to
/// writes to the daemon log. Both run the same parse/notify cycle under one
/// lock, so cycles never overlap and none is skipped. Call
/// [`Monitor::exit`] to shut it down; dropping the monitor only signals the
/// tasks to stop and leaves the daemon alone.
pub struct Monitor {
    inner: Arc<Inner>,
    shutdown: broadcast::Sender<()>,
    timer_handle: JoinHandle<Result<(), DaemonError>>,
    watch_handle: JoinHandle<Result<(), DaemonError>>,
}

impl Monitor {
    /// Verifies the daemon configuration and starts monitoring.
    ///
    /// The configuration is good when it loads and both `dir` and `auth`
    /// exist. Otherwise `setup` decides between checking again and failing
    /// with [`DaemonError::NotConfigured`]. `identity` prefixes log lines
    /// when several daemons are monitored.
    pub async fn launch(
        controller: DaemonController,
        home: &Path,
        identity: impl Into<String>,
        listener: impl StatusListener,
        setup: &mut dyn SetupHandler,
    ) -> Result<Self, DaemonError> {
        let identity = identity.into();
        let config = verified_config(controller.config_path(), home, setup)?;
        let log_path = config.dir().map(|dir| sync_log_path(dir, home));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            identity,
            controller,
            config,
            log_path,
            listener: Box::new(listener),
            pipeline: Mutex::new(Pipeline {
                snapshot: StatusSnapshot::new(),
                backoff: Backoff::new(),
            }),
            watch: StdMutex::new(None),
            events: events_tx,
            rearm: Notify::new(),
        });

        let (shutdown, _) = broadcast::channel::<()>(4);
        let timer_handle = {
            let inner = inner.clone();
            let shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move { timer_task(inner, shutdown_rx).await })
        };
        let watch_handle = {
            let inner = inner.clone();
            let shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move { watch_task(inner, events_rx, shutdown_rx).await })
        };

        let monitor = Self {
            inner,
            shutdown,
            timer_handle,
            watch_handle,
        };
        tracing::info!(
            daemon = %monitor.inner.identity,
            config = %monitor.inner.controller.config_path().display(),
            "monitor launched",
        );
        if monitor.inner.config.start_on_start {
            monitor.start().await;
        } else {
            monitor.inner.arm_watch();
        }
        Ok(monitor)
    }

    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// Daemon configuration as verified at launch.
    pub fn config(&self) -> &DaemonConfig {
        &self.inner.config
    }

    pub fn controller(&self) -> &DaemonController {
        &self.inner.controller
    }

    /// Copy of the current snapshot, taken between cycles.
    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.pipeline.lock().await.snapshot.clone()
    }

    /// Raw `status` output, outside the pipeline.
    pub async fn query(&self, user_locale: bool) -> String {
        self.inner.controller.query(user_locale).await
    }

    /// Starts the daemon if needed and re-arms the log watch.
    pub async fn start(&self) {
        if self.inner.controller.start().await {
            self.inner.arm_watch();
        }
    }

    /// Stops the daemon if it runs and re-arms the log watch.
    pub async fn stop(&self) {
        if self.inner.controller.stop().await {
            self.inner.arm_watch();
        }
    }

    /// Stops both triggers, drops the watch and, when configured, the daemon.
    ///
    /// No cycle starts after this returns.
    pub async fn exit(mut self) -> Result<(), DaemonError> {
        let _ = self.shutdown.send(());
        let (timer_result, watch_result) =
            tokio::join!(&mut self.timer_handle, &mut self.watch_handle);
        self.inner.disarm_watch();
        handle_join("timer", timer_result)?;
        handle_join("watch", watch_result)?;

        let status = self.inner.pipeline.lock().await.snapshot.status;
        if self.inner.config.stop_on_exit && status != StatusKind::None {
            self.inner.controller.stop().await;
            tracing::info!(daemon = %self.inner.identity, "daemon stopped on exit");
        }
        tracing::info!(daemon = %self.inner.identity, "monitor exited");
        Ok(())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

fn verified_config(
    path: &Path,
    home: &Path,
    setup: &mut dyn SetupHandler,
) -> Result<DaemonConfig, DaemonError> {
    loop {
        let config = DaemonConfig::open(path);
        if config.is_configured(home) {
            return Ok(config);
        }
        tracing::warn!(config = %path.display(), "daemon is not configured");
        match setup.config_error(path) {
            Recovery::Retry => continue,
            Recovery::Abort => {
                return Err(DaemonError::NotConfigured {
                    config: path.to_path_buf(),
                })
            }
        }
    }
}

impl Inner {
    /// One parse/notify cycle. Returns the delay until the next timer firing.
    async fn cycle(&self, trigger: Trigger) -> Duration {
        let mut pipeline = self.pipeline.lock().await;

        let output = self.controller.query(false).await;
        let changes = pipeline.snapshot.apply(&parse(&output));
        if changes.any() {
            tracing::debug!(
                daemon = %self.identity,
                trigger = trigger.label(),
                status = %pipeline.snapshot.status,
                last_status = %pipeline.snapshot.last_status,
                status_changed = changes.status,
                sizes_changed = changes.sizes,
                items_changed = changes.items,
                "status update",
            );
            self.listener.on_change(&pipeline.snapshot);
        }

        match trigger {
            Trigger::Watch => pipeline.backoff.reset(),
            Trigger::Timer => {
                let busy = pipeline.snapshot.status == StatusKind::Busy;
                pipeline.backoff.on_timer(busy)
            }
        }
    }

    /// Replaces the log watch. Leaves it unarmed when the log does not exist.
    fn arm_watch(&self) {
        let mut slot = self.watch.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;

        let Some(path) = &self.log_path else {
            tracing::debug!(daemon = %self.identity, "no sync dir configured, watch not armed");
            return;
        };
        if !path.exists() {
            tracing::debug!(
                daemon = %self.identity,
                path = %path.display(),
                "daemon log not found, watch not armed",
            );
            return;
        }
        match LogWatch::arm(path, self.events.clone()) {
            Ok(watch) => *slot = Some(watch),
            Err(err) => tracing::warn!(
                daemon = %self.identity,
                path = %path.display(),
                error = %err,
                "log watch failed",
            ),
        }
    }

    fn disarm_watch(&self) {
        let mut slot = self.watch.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

async fn timer_task(
    inner: Arc<Inner>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut delay = STARTUP_DELAY;
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = inner.rearm.notified() => {
                delay = inner.pipeline.lock().await.backoff.delay();
            }
            _ = tokio::time::sleep(delay) => {
                delay = inner.cycle(Trigger::Timer).await;
            }
        }
    }
    Ok(())
}

async fn watch_task(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(daemon = %inner.identity, error = %err, "watch event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                inner.cycle(Trigger::Watch).await;
                inner.rearm.notify_one();
            }
        }
    }
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::TaskJoin {
            task,
            message: err.to_string(),
        }),
    }
}

/// Installs the global `tracing` subscriber.
///
/// `level` wins over `RUST_LOG`; without either the filter is `info`. Logs go
/// to stderr so stdout stays free for command output.
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use notify::event::ModifyKind;
    use notify::EventKind;
    use tempfile::TempDir;

    use crate::controller::tests::FakeDaemon;

    const IDLE: &str = "Synchronization core status: idle\n\tTotal: 10 GB\n";
    const BUSY: &str = "Synchronization core status: busy\nSync progress: 12%\n";

    /// Home with a configured daemon; `extra` is appended to its config.
    fn configured_home(extra: &str) -> (TempDir, PathBuf) {
        let home = TempDir::new().expect("home");
        fs::create_dir_all(home.path().join("Yandex.Disk/.sync")).expect("mkdir");
        fs::write(home.path().join("passwd"), "token").expect("auth");
        let config = home.path().join("config.cfg");
        fs::write(
            &config,
            format!("dir=\"~/Yandex.Disk\"\nauth=\"~/passwd\"\n{extra}"),
        )
        .expect("config");
        (home, config)
    }

    fn abort(_: &Path) -> Recovery {
        Recovery::Abort
    }

    async fn launch(
        fake: &Arc<FakeDaemon>,
        home: &TempDir,
        config: &Path,
    ) -> (Monitor, mpsc::UnboundedReceiver<StatusSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = DaemonController::with_runner("/usr/bin/yandex-disk", config, fake.clone());
        let monitor = Monitor::launch(controller, home.path(), "", tx, &mut abort)
            .await
            .expect("launch");
        (monitor, rx)
    }

    fn gaps(times: &[tokio::time::Instant]) -> Vec<u128> {
        times.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_daemon_is_polled_with_growing_interval() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let launched_at = tokio::time::Instant::now();
        let (monitor, mut rx) = launch(&fake, &home, &config).await;

        tokio::time::sleep(Duration::from_millis(20_600)).await;

        let times = fake.status_times();
        assert_eq!((times[0] - launched_at).as_millis(), 500);
        assert_eq!(gaps(&times), vec![2_000, 3_000, 4_000, 5_000, 6_000]);

        let first = rx.try_recv().expect("first cycle notifies");
        assert_eq!(first.status, StatusKind::Idle);
        assert!(rx.try_recv().is_err(), "identical outputs must not notify");

        monitor.exit().await.expect("exit");
    }

    #[tokio::test(start_paused = true)]
    async fn watch_event_resets_the_interval() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let (monitor, _rx) = launch(&fake, &home, &config).await;

        // Timer cycles at 0.5s, 2.5s and 5.5s; the next one would be at 9.5s.
        tokio::time::sleep(Duration::from_millis(6_000)).await;
        monitor
            .inner
            .events
            .send(Ok(Event::new(EventKind::Modify(ModifyKind::Any))))
            .expect("send event");
        tokio::time::sleep(Duration::from_millis(7_100)).await;

        let times = fake.status_times();
        assert_eq!(gaps(&times), vec![2_000, 3_000, 500, 2_000, 2_000, 3_000]);

        monitor.exit().await.expect("exit");
    }

    #[tokio::test(start_paused = true)]
    async fn watch_event_during_slow_cycle_waits_for_the_lock() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        *fake.status_delay.lock().unwrap() = Duration::from_secs(1);
        let launched_at = tokio::time::Instant::now();
        let (monitor, _rx) = launch(&fake, &home, &config).await;

        // The timer cycle holds the lock from 0.5s to 1.5s.
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        monitor
            .inner
            .events
            .send(Ok(Event::new(EventKind::Modify(ModifyKind::Any))))
            .expect("send event");
        tokio::time::sleep(Duration::from_millis(2_000)).await;

        let times = fake.status_times();
        assert_eq!(times.len(), 2, "the watch cycle is queued, not dropped");
        assert_eq!((times[0] - launched_at).as_millis(), 500);
        assert_eq!(gaps(&times), vec![1_000]);
        assert_eq!(fake.peak_concurrent_status(), 1);

        monitor.exit().await.expect("exit");
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_monitor_stops_polling() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let (monitor, _rx) = launch(&fake, &home, &config).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fake.status_times().len(), 1);

        drop(monitor);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(fake.actions(), vec!["status"], "no cycle and no stop after drop");
    }

    #[tokio::test(start_paused = true)]
    async fn status_change_reaches_listener_in_order() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let (monitor, mut rx) = launch(&fake, &home, &config).await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        fake.set_status(BUSY);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        fake.set_status("");
        tokio::time::sleep(Duration::from_millis(2_000)).await;

        let statuses: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|s| (s.last_status, s.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (StatusKind::Unknown, StatusKind::Idle),
                (StatusKind::Idle, StatusKind::Busy),
                (StatusKind::Busy, StatusKind::None),
            ]
        );
        assert_eq!(monitor.snapshot().await.status, StatusKind::None);

        monitor.exit().await.expect("exit");
    }

    #[tokio::test(start_paused = true)]
    async fn busy_daemon_is_polled_every_two_seconds() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(BUSY);
        let (monitor, _rx) = launch(&fake, &home, &config).await;

        tokio::time::sleep(Duration::from_millis(8_600)).await;

        assert_eq!(gaps(&fake.status_times()), vec![2_000, 2_000, 2_000, 2_000]);
        monitor.exit().await.expect("exit");
    }

    #[tokio::test(start_paused = true)]
    async fn launch_starts_daemon_by_default() {
        let (home, config) = configured_home("");
        let fake = FakeDaemon::running("");
        let (monitor, _rx) = launch(&fake, &home, &config).await;

        assert_eq!(fake.actions(), vec!["status", "start"]);
        monitor.exit().await.expect("exit");
    }

    #[tokio::test(start_paused = true)]
    async fn exit_stops_daemon_when_configured_and_ends_polling() {
        let (home, config) = configured_home(
            "startonstartofindicator=no\nstoponexitfromindicator=yes\n",
        );
        let fake = FakeDaemon::running(IDLE);
        let (monitor, _rx) = launch(&fake, &home, &config).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        monitor.exit().await.expect("exit");
        assert_eq!(fake.actions(), vec!["status", "status", "stop"]);

        let calls = fake.actions().len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fake.actions().len(), calls, "no cycle after exit");
    }

    #[tokio::test(start_paused = true)]
    async fn exit_leaves_daemon_running_by_default() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let (monitor, _rx) = launch(&fake, &home, &config).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        monitor.exit().await.expect("exit");
        assert!(!fake.actions().contains(&"stop".to_owned()));
    }

    #[tokio::test]
    async fn closure_listener_is_called() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let controller = DaemonController::with_runner("/usr/bin/yandex-disk", &config, fake.clone());

        let monitor = Monitor::launch(
            controller,
            home.path(),
            "#1 ",
            move |_: &StatusSnapshot| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &mut abort,
        )
        .await
        .expect("launch");
        let delay = monitor.inner.cycle(Trigger::Timer).await;

        assert_eq!(delay, Duration::from_secs(2));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.identity(), "#1 ");
        monitor.exit().await.expect("exit");
    }

    #[tokio::test]
    async fn unconfigured_daemon_asks_setup_handler() {
        let home = TempDir::new().expect("home");
        let config = home.path().join("config.cfg");
        let fake = FakeDaemon::running(IDLE);
        let controller = DaemonController::with_runner("/usr/bin/yandex-disk", &config, fake.clone());

        let mut asked = 0;
        let mut setup = |path: &Path| {
            asked += 1;
            assert_eq!(path, config.as_path());
            Recovery::Abort
        };
        let (tx, _rx) = mpsc::unbounded_channel::<StatusSnapshot>();
        let err = Monitor::launch(controller, home.path(), "", tx, &mut setup)
            .await
            .err()
            .expect("launch must fail");

        assert!(matches!(err, DaemonError::NotConfigured { .. }), "got: {err}");
        assert_eq!(asked, 1);
        assert!(fake.actions().is_empty());
    }

    #[tokio::test]
    async fn retry_rechecks_after_setup_fixed_the_config() {
        let home = TempDir::new().expect("home");
        let config = home.path().join("config.cfg");
        let fake = FakeDaemon::running(IDLE);
        let controller = DaemonController::with_runner("/usr/bin/yandex-disk", &config, fake.clone());

        let fix_home = home.path().to_path_buf();
        let fix_config = config.clone();
        let mut setup = move |_: &Path| {
            fs::create_dir_all(fix_home.join("disk")).expect("mkdir");
            fs::write(fix_home.join("passwd"), "token").expect("auth");
            fs::write(
                &fix_config,
                "dir=\"~/disk\"\nauth=\"~/passwd\"\nstartonstartofindicator=no\n",
            )
            .expect("config");
            Recovery::Retry
        };
        let (tx, _rx) = mpsc::unbounded_channel::<StatusSnapshot>();
        let monitor = Monitor::launch(controller, home.path(), "", tx, &mut setup)
            .await
            .expect("launch after retry");

        assert_eq!(monitor.config().dir(), Some("~/disk"));
        monitor.exit().await.expect("exit");
    }

    #[tokio::test]
    async fn existing_log_is_watched() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        fs::write(home.path().join("Yandex.Disk/.sync/cli.log"), "").expect("log");
        let fake = FakeDaemon::running(IDLE);
        let (monitor, _rx) = launch(&fake, &home, &config).await;

        let inner = monitor.inner.clone();
        assert!(inner.watch.lock().unwrap().is_some());

        monitor.exit().await.expect("exit");
        assert!(inner.watch.lock().unwrap().is_none(), "exit drops the watch");
    }

    #[tokio::test]
    async fn missing_log_is_not_watched() {
        let (home, config) = configured_home("startonstartofindicator=no\n");
        let fake = FakeDaemon::running(IDLE);
        let (monitor, _rx) = launch(&fake, &home, &config).await;

        assert!(monitor.inner.watch.lock().unwrap().is_none());
        monitor.exit().await.expect("exit");
    }
}
