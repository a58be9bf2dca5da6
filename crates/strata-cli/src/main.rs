//! Strata CLI - batch warehouse jobs.
//!
//! The main entry point for the `strata` CLI binary.

use anyhow::Result;
use clap::Parser;

use strata_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    strata_core::init_logging(cli.log_format);
    let config = cli.config(std::env::vars());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::InitTable(args) => {
                strata_cli::commands::init_table::execute(&args, &config).await
            }
            Commands::DropTable(args) => {
                strata_cli::commands::drop_table::execute(&args, &config).await
            }
            Commands::Load(args) => strata_cli::commands::load::execute(&args, &config).await,
            Commands::Reconcile(args) => {
                strata_cli::commands::reconcile::execute(&args, &config).await
            }
            Commands::Extract(args) => {
                strata_cli::commands::extract::execute(&args, &config).await
            }
            Commands::Show(args) => strata_cli::commands::show::execute(&args, &config).await,
        }
    })
}
