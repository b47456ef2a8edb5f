mod cli;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    if rangedl_core::logging::init_logging().is_err() {
        rangedl_core::logging::init_logging_stderr();
    }

    let args = cli::Cli::parse();
    cli::run(args).await
}
