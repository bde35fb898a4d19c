//! Command-line arguments.

use clap::Parser;
use driverlab_core::{RunMode, TargetId};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "driverlab",
    version,
    about = "Interactive console for a DriverLab driver session"
)]
pub struct Cli {
    /// Driver to attach to.
    pub driver: TargetId,

    /// Config file (defaults to ./driverlab.toml when present).
    #[arg(long, short, env = "DRIVERLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server base URL, e.g. ws://127.0.0.1:6200.
    #[arg(long, short, env = "DRIVERLAB_SERVER")]
    pub server: Option<String>,

    /// Run mode: oneshot or keepalive.
    #[arg(long, short)]
    pub mode: Option<RunMode>,

    /// Extra driver argument (repeatable).
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,
}
