//! ydtools: monitor and control the Yandex.Disk sync daemon.
//!
//! # Usage
//!
//! ```text
//! ydtools [--log-level LEVEL] watch [--config PATH]... [--remove PATH]... [--timeout SECS]
//! ydtools status [--config PATH] [--json] [--user-locale]
//! ydtools start [--config PATH]
//! ydtools stop [--config PATH]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use commands::{control::ControlArgs, status::StatusArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ydtools",
    version,
    about = "Monitor and control the Yandex.Disk sync daemon",
    long_about = None,
)]
struct Cli {
    /// Log verbosity; overrides RUST_LOG.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow daemon status changes until interrupted.
    Watch(WatchArgs),

    /// Query the daemon once and print its status.
    Status(StatusArgs),

    /// Start the daemon unless it already runs.
    Start(ControlArgs),

    /// Stop the daemon if it runs.
    Stop(ControlArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    ydtools_daemon::init_tracing(cli.log_level.map(LogLevel::as_str));

    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Start(args) => args.start(),
        Commands::Stop(args) => args.stop(),
    }
}
