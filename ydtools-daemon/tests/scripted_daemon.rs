//! Controller and monitor against a shell script standing in for `yandex-disk`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use ydtools_daemon::{DaemonController, Monitor, Recovery, SystemRunner};
use ydtools_status::{StatusKind, StatusSnapshot};

// `$3` is the action; `-c <config>` come first. State lives next to the script.
const SCRIPT: &str = r#"#!/bin/sh
state="${0%/*}/running"
case "$3" in
  status)
    if [ -f "$state" ]; then
      printf 'Synchronization core status: idle\nLANG: %s\n\tTotal: 10 GB\n\nLast synchronized items:\n\tfile: %s\n' "$LANG" "'notes.txt'"
    else
      printf 'Error: daemon not started\n' >&2
      exit 1
    fi
    ;;
  start) : > "$state"; printf 'Starting daemon process...Done\n' ;;
  stop) rm -f "$state"; printf 'Daemon stopped.\n' ;;
  slow) sleep 5 ;;
esac
"#;

struct Sandbox {
    home: TempDir,
    script: PathBuf,
    config: PathBuf,
}

fn sandbox() -> Sandbox {
    let home = TempDir::new().expect("home");
    let bin = home.path().join("bin");
    fs::create_dir_all(&bin).expect("bin");
    let script = bin.join("yandex-disk");
    fs::write(&script, SCRIPT).expect("script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

    fs::create_dir_all(home.path().join("Yandex.Disk/.sync")).expect("disk");
    fs::write(home.path().join("passwd"), "token").expect("auth");
    let config = home.path().join("config.cfg");
    fs::write(
        &config,
        "dir=\"~/Yandex.Disk\"\nauth=\"~/passwd\"\nstoponexitfromindicator=\"yes\"\n",
    )
    .expect("config");

    Sandbox {
        home,
        script,
        config,
    }
}

fn controller(sb: &Sandbox) -> DaemonController {
    DaemonController::with_runner(&sb.script, &sb.config, Arc::new(SystemRunner::default()))
}

fn is_running(sb: &Sandbox) -> bool {
    sb.script.with_file_name("running").exists()
}

#[tokio::test]
async fn status_runs_with_english_locale() {
    let sb = sandbox();
    let controller = controller(&sb);

    assert_eq!(controller.query(false).await, "", "stopped daemon reads as empty");
    assert!(controller.start().await);
    assert!(is_running(&sb));

    let output = controller.query(false).await;
    assert!(output.contains("LANG: en_US.UTF-8"), "got: {output}");
    assert!(controller.stop().await);
    assert!(!is_running(&sb));
}

#[tokio::test]
async fn hung_daemon_times_out_as_empty_output() {
    let sb = sandbox();
    let runner = SystemRunner::with_timeout(Duration::from_millis(200));
    let invocation = ydtools_daemon::Invocation {
        program: sb.script.clone(),
        args: vec!["-c".into(), sb.config.display().to_string(), "slow".into()],
        env: None,
    };

    let err = ydtools_daemon::CommandRunner::run(&runner, &invocation)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
}

#[tokio::test]
async fn monitor_starts_reports_and_stops_daemon() {
    let sb = sandbox();
    let (tx, mut rx) = mpsc::unbounded_channel::<StatusSnapshot>();
    let mut abort = |_: &Path| Recovery::Abort;

    let monitor = Monitor::launch(controller(&sb), sb.home.path(), "", tx, &mut abort)
        .await
        .expect("launch");
    assert!(is_running(&sb), "start_on_start defaults to true");

    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first cycle within startup delay")
        .expect("listener channel open");
    assert_eq!(snapshot.status, StatusKind::Idle);
    assert_eq!(snapshot.total, "10 GB");
    assert_eq!(snapshot.last_items, vec!["notes.txt"]);

    monitor.exit().await.expect("exit");
    assert!(!is_running(&sb), "stoponexitfromindicator=yes stops the daemon");
}
