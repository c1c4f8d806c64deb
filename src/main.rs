use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use minepermit::cli::{Cli, Commands};
use minepermit::commands::{groups, run};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Groups(args) => groups::run(&cli, args),
    }
}
