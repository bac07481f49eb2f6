use std::sync::Arc;

use crate::bucket::{BucketBackend, Buckets};
use crate::bucket_fs::FsBucket;
use crate::bucket_mem::MemBucket;
use crate::catalog::{Catalog, MemCatalog, SqlCatalog};
use crate::config::{Backend, StoreConfig};
use crate::error::{Result, SplitError};
use crate::store::SplitStore;

pub async fn open_buckets(cfg: &StoreConfig) -> Result<Buckets> {
    let mut out: Vec<Arc<dyn BucketBackend>> = Vec::with_capacity(cfg.fan_out);
    for index in 0..cfg.fan_out {
        match cfg.backend {
            Backend::Fs => {
                let bucket = FsBucket::open(&cfg.data_dir, index).await.map_err(|e| {
                    SplitError::Config(format!(
                        "bucket {} under {}: {e}",
                        index + 1,
                        cfg.data_dir.display()
                    ))
                })?;
                out.push(Arc::new(bucket));
            }
            Backend::Memory => out.push(Arc::new(MemBucket::new(index))),
        }
    }
    Ok(Buckets::new(out))
}

/// For `Fs` this also applies any pending schema migrations.
pub async fn open_catalog(cfg: &StoreConfig) -> Result<Arc<dyn Catalog>> {
    match cfg.backend {
        Backend::Fs => Ok(Arc::new(
            SqlCatalog::open_migrated(&cfg.catalog_path, cfg.fan_out).await?,
        )),
        Backend::Memory => Ok(Arc::new(MemCatalog::new(cfg.fan_out))),
    }
}

pub async fn open_store(cfg: StoreConfig) -> Result<SplitStore> {
    cfg.validate()?;
    let buckets = open_buckets(&cfg).await?;
    let catalog = open_catalog(&cfg).await?;
    SplitStore::new(cfg, buckets, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn fs_backend_lays_out_numbered_bucket_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = StoreConfig {
            fan_out: 3,
            data_dir: tmp.path().to_path_buf(),
            catalog_path: tmp.path().join("split.db").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let store = open_store(cfg).await.unwrap();
        for i in 1..=3 {
            assert!(tmp.path().join(format!("bucket{i}")).is_dir());
        }
        let id = store
            .upload("hello.txt", Bytes::from_static(b"hello world"))
            .await
            .unwrap();
        assert_eq!(&store.read_to_end(id).await.unwrap()[..], b"hello world");
    }

    #[tokio::test]
    async fn zero_fan_out_is_rejected_before_anything_is_opened() {
        let mut cfg = StoreConfig::in_memory(3);
        cfg.fan_out = 0;
        assert!(matches!(
            open_store(cfg).await,
            Err(SplitError::InvalidFanOut(0))
        ));
    }
}
