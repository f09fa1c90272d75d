//! Monitoring runtime for the `yandex-disk` daemon: controller, log watch
//! and the timer/watch scheduler that keeps a status snapshot current.

pub mod backoff;
pub mod controller;
mod error;
pub mod paths;
mod runtime;
pub mod watch;

pub use controller::{CommandOutput, CommandRunner, DaemonController, Invocation, SystemRunner};
pub use error::DaemonError;
pub use runtime::{init_tracing, Monitor, Recovery, SetupHandler, StatusListener};
