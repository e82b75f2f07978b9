//! taskmesh CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskmesh_cli::{batch, supply, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => batch::execute(args),
        Commands::Build(args) => supply::execute(args),
        Commands::Version => {
            println!("taskmesh {}", env!("CARGO_PKG_VERSION"));
            println!("core version: {}", taskmesh_core::VERSION);
            Ok(())
        }
    }
}
