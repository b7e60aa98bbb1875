use anyhow::Result;
use clap::Parser;
use log::info;
use stakeledger::cli::{Cli, CliHandler};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("=== stakeledger {} ===", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut handler = CliHandler::new();
    handler.handle_command(cli)
}
