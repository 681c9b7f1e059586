mod cli_args;
mod commands;

use clap::Parser;
use cli_args::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Info { file } => commands::info(&file),
        Commands::Tags { file, tag } => commands::tags(&file, tag),
    }
}
