pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use split_core::error::Result;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match cli.command {
        Commands::Upload { src, recursive } => {
            handlers::handle_upload(&cli.store, src, recursive).await
        }
        Commands::Download { id, out } => handlers::handle_download(&cli.store, id, out).await,
        Commands::Cat { id } => handlers::handle_cat(&cli.store, id).await,
        Commands::Ls { long } => handlers::handle_ls(&cli.store, long).await,
        Commands::Chunks { id } => handlers::handle_chunks(&cli.store, id).await,
        Commands::Migrate { dir } => handlers::handle_migrate(&cli.store, dir).await,
    }
}

fn init_tracing(default: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
