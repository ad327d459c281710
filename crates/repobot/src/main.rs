mod bootstrap_helpers;
mod startup;

use anyhow::Result;
use clap::Parser;
use repobot_cli::Cli;

use crate::bootstrap_helpers::init_tracing;
use crate::startup::run_bot;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_bot(&cli).await
}
