use anyhow::Result;
use clap::Parser;

use agency_desk::cli::commands::run;
use agency_desk::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(async { run(cli).await })
}
