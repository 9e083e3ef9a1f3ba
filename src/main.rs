use anyhow::Context;
use clap::Parser;
use laykey::cli::{Cli, Sub};
use laykey::config::Config;
use laykey::device;
use laykey::grab::GrabManager;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.subcommand {
        Sub::List => {
            for dev in device::enumerate_keyboards()? {
                println!("{dev}");
            }
        }
        Sub::Grab { config } => {
            let config = Config::load(&config)
                .with_context(|| format!("loading config from {}", config.display()))?;
            let mut manager = GrabManager::new(config).context("initializing grab manager")?;
            manager.run().context("running event loop")?;
        }
    }

    Ok(())
}
