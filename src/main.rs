// Entrypoint for the CLI application.
// - Loads `.env`, sets up logging on stderr, then hands off to `cli::run`.
// - Returns `anyhow::Result` so failures print with their context chain.

use anyhow::Context;
use clap::Parser;
use noipfraud_cli::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // A missing .env is fine; settings can come from flags or the shell.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    run(cli)
}
