use clap::Parser;
use pv_battery_opt::cli::{Cli, execute};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.logging_level)),
        )
        .init();

    execute(cli.command)?;
    tracing::info!("Optimisation complete!");
    Ok(())
}
