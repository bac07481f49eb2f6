// split_core/src/store.rs
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info};

use crate::bucket::{BucketBackend, Buckets};
use crate::catalog::Catalog;
use crate::config::StoreConfig;
use crate::domain::{ChunkId, ChunkRow, FileId, FileRecord, NewFile};
use crate::error::{Result, SplitError};
use crate::fanout::{ChunkWrite, FanOutWriter};
use crate::partition::partition;
use crate::reassemble::{Download, Reassembler};

/// Upload and download entry point over N buckets and one catalog.
///
/// Safe to share across tasks; concurrent uploads never coordinate with each
/// other beyond the catalog's own transactions.
#[derive(Clone)]
pub struct SplitStore {
    config: StoreConfig,
    buckets: Buckets,
    catalog: Arc<dyn Catalog>,
    writer: FanOutWriter,
    reassembler: Reassembler,
}

impl SplitStore {
    pub fn new(config: StoreConfig, buckets: Buckets, catalog: Arc<dyn Catalog>) -> Result<Self> {
        config.validate()?;
        if buckets.fan_out() != config.fan_out {
            return Err(SplitError::Config(format!(
                "{} buckets configured for fan-out {}",
                buckets.fan_out(),
                config.fan_out
            )));
        }
        // chunk_ids[i] is resolved against position i on every read
        if let Some((pos, b)) = buckets.iter().enumerate().find(|(i, b)| b.index() != *i) {
            return Err(SplitError::Config(format!(
                "bucket at position {pos} reports index {}",
                b.index()
            )));
        }
        Ok(Self {
            writer: FanOutWriter::new(buckets.clone()),
            reassembler: Reassembler::new(catalog.clone(), buckets.clone()),
            config,
            buckets,
            catalog,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn fan_out(&self) -> usize {
        self.buckets.fan_out()
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Splits `data` into one chunk per bucket, writes them concurrently, then
    /// records the file. Returns only after the record is visible.
    pub async fn upload(&self, name: &str, data: Bytes) -> Result<FileId> {
        let size = data.len() as u64;
        let writes: Vec<ChunkWrite> = partition(size, self.fan_out())?
            .into_iter()
            .map(|r| ChunkWrite {
                bucket: r.bucket,
                id: ChunkId::generate(),
                data: data.slice(r.as_usize_range()),
            })
            .collect();

        let chunk_ids = self.writer.write_all(writes).await.inspect_err(|e| {
            error!(name, size, error = %e, "upload aborted");
        })?;

        let new_file = NewFile {
            name: name.to_string(),
            size,
            chunk_ids: chunk_ids.clone(),
        };
        match self.catalog.create(new_file).await {
            Ok(id) => {
                info!(file_id = %id, name, size, fan_out = self.fan_out(), "file uploaded");
                Ok(id)
            }
            Err(e) => {
                error!(name, size, error = %e, "catalog write failed, removing chunks");
                let stored: Vec<(usize, ChunkId)> = chunk_ids.into_iter().enumerate().collect();
                self.writer.compensate(&stored).await;
                Err(SplitError::from_catalog_write(e))
            }
        }
    }

    /// Uploads a local file under its base name.
    pub async fn upload_path(&self, path: &Path) -> Result<FileId> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SplitError::Config(format!("no file name in {}", path.display())))?;
        let data = tokio::fs::read(path).await?;
        self.upload(&name, Bytes::from(data)).await
    }

    /// Opens a download in the configured read mode.
    pub async fn download(&self, id: FileId) -> Result<Download> {
        self.reassembler.open(id, self.config.read_mode).await
    }

    /// Buffered read regardless of the configured mode.
    pub async fn read_to_end(&self, id: FileId) -> Result<Bytes> {
        let (_, data) = self.reassembler.read_all(id).await?;
        Ok(data)
    }

    pub async fn record(&self, id: FileId) -> Result<FileRecord> {
        self.catalog
            .get(id)
            .await
            .map_err(SplitError::from_catalog_read)
    }

    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        self.catalog
            .list()
            .await
            .map_err(SplitError::from_catalog_read)
    }

    /// Bucket, chunk id and byte range of every chunk of a file.
    pub async fn chunk_map(&self, id: FileId) -> Result<Vec<ChunkRow>> {
        let rec = self.reassembler.resolve(id).await?;
        chunk_rows(&rec)
    }
}

/// Derives the chunk map from a record; ranges follow from size and fan-out alone.
pub fn chunk_rows(rec: &FileRecord) -> Result<Vec<ChunkRow>> {
    let ranges = partition(rec.size, rec.chunk_ids.len())?;
    Ok(ranges
        .into_iter()
        .zip(&rec.chunk_ids)
        .map(|(r, id)| ChunkRow {
            bucket: r.bucket,
            id: id.clone(),
            start: r.start,
            end: r.end,
        })
        .collect())
}
