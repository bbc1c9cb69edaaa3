use std::path::Path;

use clap::Parser;
use color_eyre::Result;
use taskflow::{
    cli::{self, Cli, Commands},
    Config, Profile, Stores,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Logs go to stderr so command output stays clean; RUST_LOG overrides the level
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    let config = match &cli.config {
        Some(path) => Config::load_from_path(Path::new(path), profile)?,
        None => Config::load_with_profile(profile)?,
    };

    let stores = Stores::open(&config.storage)?;

    let command = cli.command.unwrap_or(Commands::List {
        category: None,
        priority: None,
        search: None,
        json: false,
    });
    cli::run(command, &stores, &config)?;

    Ok(())
}
