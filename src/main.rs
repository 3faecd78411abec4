mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use commands::{run_check_config, run_diagnose, run_fetch};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => {
            run_fetch(args)?;
        }
        Commands::Diagnose(args) => {
            run_diagnose(args)?;
        }
        Commands::CheckConfig(args) => {
            run_check_config(args)?;
        }
    }

    Ok(())
}
