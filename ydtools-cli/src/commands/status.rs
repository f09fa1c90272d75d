//! `ydtools status`: one query, parsed and printed.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::Args;

use ydtools_status::{parse, ChangeSet, StatusSnapshot};

use super::{home, runtime, DaemonArgs};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub daemon: DaemonArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Run the daemon with the caller's locale instead of English.
    #[arg(long)]
    pub user_locale: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let controller = self.daemon.controller(&home)?;
        let output = runtime()?.block_on(controller.query(self.user_locale));

        let mut snapshot = StatusSnapshot::new();
        snapshot.apply(&parse(&output));

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).context("failed to render status JSON")?
            );
            return Ok(());
        }
        print!("{}", render(&snapshot, "", ChangeSet::all()));
        Ok(())
    }
}

/// Text for the groups flagged in `changes`, each line prefixed by `identity`.
pub fn render(snapshot: &StatusSnapshot, identity: &str, changes: ChangeSet) -> String {
    let mut out = String::new();
    if changes.status {
        let _ = write!(out, "{identity}Status: {}", snapshot.status);
        if !snapshot.progress.is_empty() {
            let _ = write!(out, " {}", snapshot.progress);
        }
        out.push('\n');
    }
    if changes.sizes {
        let _ = writeln!(
            out,
            "{identity}Used: {}/{}",
            snapshot.used, snapshot.total
        );
        let _ = writeln!(
            out,
            "{identity}Free: {}, trash: {}",
            snapshot.free, snapshot.trash
        );
        if !matches!(snapshot.error.as_str(), "" | "...") {
            let _ = writeln!(out, "{identity}Error: {} {}", snapshot.error, snapshot.path);
        }
    }
    if changes.items {
        let _ = writeln!(out, "{identity}Last synchronized items:");
        for item in &snapshot.last_items {
            let _ = writeln!(out, "{identity}  {item}");
        }
    }
    out
}
