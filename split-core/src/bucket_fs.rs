use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::bucket::BucketBackend;
use crate::domain::ChunkId;
use crate::error::BucketError;

/// Directory-backed bucket: chunk `id` of bucket `i` lives at `<root>/bucket<i+1>/<id>`.
#[derive(Clone, Debug)]
pub struct FsBucket {
    index: usize,
    dir: PathBuf,
}

impl FsBucket {
    pub async fn open(root: &Path, index: usize) -> Result<Self, BucketError> {
        let dir = root.join(format!("bucket{}", index + 1));
        fs::create_dir_all(&dir).await?;
        Ok(Self { index, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chunk_path(&self, id: &ChunkId) -> Result<PathBuf, BucketError> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(BucketError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("unsafe chunk id: {name}"),
            )));
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl BucketBackend for FsBucket {
    fn index(&self) -> usize {
        self.index
    }

    async fn put(&self, id: &ChunkId, data: Bytes) -> Result<(), BucketError> {
        let path = self.chunk_path(id)?;
        // Write beside the target and rename so readers never see a partial chunk.
        // Each tokio::fs call runs on the blocking pool and finishes even if this
        // future is dropped; delete also clears the `.part` file for that reason.
        let tmp = self.dir.join(format!(".{}.part", id.as_str()));
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(&data).await?;
        f.sync_all().await?;
        drop(f);
        fs::rename(&tmp, &path).await?;
        debug!(bucket = self.index, chunk_id = %id, bytes = data.len(), "chunk saved");
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Bytes, BucketError> {
        let path = self.chunk_path(id)?;
        match fs::read(&path).await {
            Ok(v) => Ok(Bytes::from(v)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BucketError::NotFound {
                bucket: self.index,
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &ChunkId) -> Result<(), BucketError> {
        let path = self.chunk_path(id)?;
        let tmp = self.dir.join(format!(".{}.part", id.as_str()));
        for p in [path, tmp] {
            match fs::remove_file(&p).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
