use std::path::{Path, PathBuf};

use split_core::catalog::{Migrator, SqlCatalog};
use split_core::error::{Result, SplitError};
use split_core::{Backend, FileId, ReadMode, SplitStore, StoreConfig, open_store};
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::presentation::cli::{ReadModeArg, StoreArgs};

/// Config file (or defaults) with command-line overrides applied.
pub fn store_config(args: &StoreArgs) -> Result<StoreConfig> {
    let mut cfg = match &args.config {
        Some(path) => StoreConfig::from_path(path)?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        cfg.data_dir = dir.clone();
    }
    if let Some(catalog) = &args.catalog {
        cfg.catalog_path = catalog.clone();
    }
    if let Some(n) = args.fan_out {
        cfg.fan_out = n;
    }
    if let Some(mode) = args.read_mode {
        cfg.read_mode = match mode {
            ReadModeArg::Buffered => ReadMode::Buffered,
            ReadModeArg::Streaming => ReadMode::Streaming,
        };
    }
    cfg.validate()?;
    debug!(?cfg, "store config resolved");
    Ok(cfg)
}

async fn store_from_args(args: &StoreArgs) -> Result<SplitStore> {
    open_store(store_config(args)?).await
}

pub async fn handle_upload(args: &StoreArgs, src: PathBuf, recursive: bool) -> Result<()> {
    let store = store_from_args(args).await?;
    for id in upload_all(&store, &src, recursive).await? {
        println!("{id}");
    }
    Ok(())
}

/// Uploads `src`, or every regular file below it when `recursive`.
pub async fn upload_all(store: &SplitStore, src: &Path, recursive: bool) -> Result<Vec<FileId>> {
    if !src.is_dir() {
        let id = store.upload_path(src).await?;
        eprintln!("upload: {} -> {id}", src.display());
        return Ok(vec![id]);
    }
    if !recursive {
        return Err(SplitError::Config(format!(
            "{} is a directory; pass --recursive",
            src.display()
        )));
    }

    let mut ids = Vec::new();
    for entry in walkdir::WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() {
            let id = store.upload_path(entry.path()).await?;
            eprintln!("upload: {} -> {id}", entry.path().display());
            ids.push(id);
        }
    }
    Ok(ids)
}

pub async fn handle_download(args: &StoreArgs, id: i64, out: Option<PathBuf>) -> Result<()> {
    let store = store_from_args(args).await?;
    let dl = store.download(FileId(id)).await?;
    let out = match out {
        Some(p) => p,
        // never let a stored name escape the current directory
        None => Path::new(&dl.record.name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("file-{id}"))),
    };

    let mut body = dl.body;
    let mut file = tokio::fs::File::create(&out).await?;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => file.write_all(&bytes).await?,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&out).await;
                return Err(e);
            }
        }
    }
    file.flush().await?;
    eprintln!(
        "download: {id} -> {} ({} bytes)",
        out.display(),
        dl.record.size
    );
    Ok(())
}

pub async fn handle_cat(args: &StoreArgs, id: i64) -> Result<()> {
    let store = store_from_args(args).await?;
    let mut body = store.download(FileId(id)).await?.body;
    let mut out = tokio::io::stdout();
    while let Some(chunk) = body.next().await {
        out.write_all(&chunk?).await?;
    }
    out.flush().await?;
    Ok(())
}

pub async fn handle_ls(args: &StoreArgs, long: bool) -> Result<()> {
    let store = store_from_args(args).await?;
    for rec in store.list().await? {
        if long {
            println!(
                "{:>6}  {:>12}  {:>10}  {}",
                rec.id, rec.size, rec.created_at, rec.name
            );
        } else {
            println!("{:>6}  {}", rec.id, rec.name);
        }
    }
    Ok(())
}

pub async fn handle_chunks(args: &StoreArgs, id: i64) -> Result<()> {
    let store = store_from_args(args).await?;
    for r in store.chunk_map(FileId(id)).await? {
        println!(
            "bucket{:<3} id={} off={} len={}",
            r.bucket + 1,
            r.id,
            r.start,
            r.len()
        );
    }
    Ok(())
}

pub async fn handle_migrate(args: &StoreArgs, dir: Option<PathBuf>) -> Result<()> {
    let cfg = store_config(args)?;
    if cfg.backend != Backend::Fs {
        eprintln!("migrate: {:?} backend has no schema", cfg.backend);
        return Ok(());
    }
    let migrator = match dir {
        Some(d) => Migrator::from_dir(&d)?,
        None => Migrator::embedded(),
    };
    let catalog = SqlCatalog::open(&cfg.catalog_path, cfg.fan_out)
        .await
        .map_err(|e| SplitError::Migration(e.to_string()))?;
    let applied = catalog.migrate(&migrator).await?;
    if applied.is_empty() {
        eprintln!("migrate: up to date");
    } else {
        for v in applied {
            eprintln!("migrate: applied {v:04}");
        }
    }
    Ok(())
}
