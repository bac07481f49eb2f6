use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use split_http::{AppState, LogFormat, ServerConfig, init_tracing, router};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "split-http: upload/download over HTTP", long_about = None)]
struct Args {
    /// TOML server config; the [store] table configures buckets and catalog
    #[arg(long)]
    config: Option<PathBuf>,

    /// overrides listen_addr
    #[arg(long)]
    listen: Option<String>,

    /// overrides log_format (human or json)
    #[arg(long = "log-format")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => ServerConfig::from_path(path)?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = args.listen {
        cfg.listen_addr = addr;
    }
    if let Some(fmt) = args.log_format {
        cfg.log_format = fmt;
    }

    init_tracing(cfg.log_format);

    let store = split_core::open_store(cfg.store.clone())
        .await
        .context("open store")?;
    info!(
        fan_out = store.fan_out(),
        data_dir = %cfg.store.data_dir.display(),
        catalog = %cfg.store.catalog_path,
        "store ready"
    );

    let app = router(AppState::new(store), cfg.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;
    info!(addr = %cfg.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;
    Ok(())
}
