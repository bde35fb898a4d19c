//! `driverlab` - interactive console for one DriverLab driver session.
//!
//!   driverlab calc --server ws://127.0.0.1:6200 --mode oneshot
//!   > exec add {"a": 1, "b": 2}

mod cli;
mod config;
mod console;

use clap::Parser;
use driverlab_core::ConnectParams;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("driverlab=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?.with_overrides(&cli);
    config.validate()?;

    let params =
        ConnectParams::new(cli.driver.clone(), config.run_mode).with_args(cli.args.clone());
    console::run(config, params).await
}
