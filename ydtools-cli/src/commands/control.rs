//! `ydtools start` / `ydtools stop`.

use anyhow::{bail, Result};
use clap::Args;

use super::{home, runtime, DaemonArgs};

#[derive(Args, Debug)]
pub struct ControlArgs {
    #[command(flatten)]
    pub daemon: DaemonArgs,
}

impl ControlArgs {
    pub fn start(self) -> Result<()> {
        let home = home()?;
        let controller = self.daemon.controller(&home)?;
        if !runtime()?.block_on(controller.start()) {
            bail!(
                "daemon failed to start (config: {})",
                controller.config_path().display()
            );
        }
        println!("daemon is running");
        Ok(())
    }

    pub fn stop(self) -> Result<()> {
        let home = home()?;
        let controller = self.daemon.controller(&home)?;
        if runtime()?.block_on(controller.stop()) {
            println!("daemon stopped");
        } else {
            println!("daemon was not stopped");
        }
        Ok(())
    }
}
