use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::bucket::Buckets;
use crate::catalog::Catalog;
use crate::config::ReadMode;
use crate::domain::{FileId, FileRecord};
use crate::error::{Result, SplitError};

/// A resolved download: the catalog record plus the body in bucket order.
#[derive(Debug)]
pub struct Download {
    pub record: FileRecord,
    pub body: ChunkStream,
}

/// File bytes, one item per chunk.
///
/// A buffered stream has already been length-checked and cannot fail. A streaming
/// one has its first chunk in hand before it is returned; it yields an `Err` item in
/// place of a later chunk that could not be read, or after the last chunk if the
/// total disagrees with the recorded size.
pub struct ChunkStream {
    inner: Inner,
}

enum Inner {
    Ready(std::vec::IntoIter<Bytes>),
    Channel(ReceiverStream<Result<Bytes>>),
}

impl ChunkStream {
    fn ready(chunks: Vec<Bytes>) -> Self {
        Self {
            inner: Inner::Ready(chunks.into_iter()),
        }
    }

    /// Drains the stream into one contiguous buffer.
    pub async fn collect_bytes(mut self) -> Result<Bytes> {
        use tokio_stream::StreamExt;

        let mut parts = Vec::new();
        while let Some(chunk) = self.next().await {
            parts.push(chunk?);
        }
        Ok(concat(parts))
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.inner {
            Inner::Ready(_) => "buffered",
            Inner::Channel(_) => "streaming",
        };
        f.debug_struct("ChunkStream").field("mode", &mode).finish()
    }
}

impl Stream for ChunkStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.inner {
            Inner::Ready(it) => Poll::Ready(it.next().map(Ok)),
            Inner::Channel(rx) => Pin::new(rx).poll_next(cx),
        }
    }
}

fn concat(parts: Vec<Bytes>) -> Bytes {
    match parts.len() {
        0 => Bytes::new(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => {
            let total = parts.iter().map(Bytes::len).sum();
            let mut buf = BytesMut::with_capacity(total);
            for p in parts {
                buf.extend_from_slice(&p);
            }
            buf.freeze()
        }
    }
}

/// Resolves a file id through the catalog and reads its chunks back in order.
#[derive(Clone)]
pub struct Reassembler {
    catalog: Arc<dyn Catalog>,
    buckets: Buckets,
}

impl Reassembler {
    pub fn new(catalog: Arc<dyn Catalog>, buckets: Buckets) -> Self {
        Self { catalog, buckets }
    }

    /// Catalog lookup plus the shape check every read needs.
    pub async fn resolve(&self, id: FileId) -> Result<FileRecord> {
        let rec = self
            .catalog
            .get(id)
            .await
            .map_err(SplitError::from_catalog_read)?;
        if rec.chunk_ids.len() != self.buckets.fan_out() {
            return Err(SplitError::CatalogRead(format!(
                "file {id} has {} chunk ids, fan-out is {}",
                rec.chunk_ids.len(),
                self.buckets.fan_out()
            )));
        }
        Ok(rec)
    }

    pub async fn open(&self, id: FileId, mode: ReadMode) -> Result<Download> {
        let record = self.resolve(id).await?;
        let body = match mode {
            ReadMode::Buffered => ChunkStream::ready(self.read_chunks(&record).await?),
            ReadMode::Streaming => self.open_stream(&record).await?,
        };
        Ok(Download { record, body })
    }

    /// Buffered read: every chunk, length-checked, as one buffer.
    pub async fn read_all(&self, id: FileId) -> Result<(FileRecord, Bytes)> {
        let record = self.resolve(id).await?;
        let chunks = self.read_chunks(&record).await?;
        Ok((record, concat(chunks)))
    }

    async fn read_chunks(&self, rec: &FileRecord) -> Result<Vec<Bytes>> {
        let mut out = Vec::with_capacity(rec.chunk_ids.len());
        let mut total = 0u64;
        for bucket in 0..rec.chunk_ids.len() {
            let data = self.read_chunk(rec, bucket).await?;
            total += data.len() as u64;
            out.push(data);
        }
        if total != rec.size {
            error!(file_id = %rec.id, expected = rec.size, actual = total, "length mismatch");
            return Err(SplitError::LengthMismatch {
                expected: rec.size,
                actual: total,
            });
        }
        debug!(file_id = %rec.id, bytes = total, "file reassembled");
        Ok(out)
    }

    async fn read_chunk(&self, rec: &FileRecord, bucket: usize) -> Result<Bytes> {
        let (Some(backend), Some(id)) = (self.buckets.get(bucket), rec.chunk_ids.get(bucket)) else {
            return Err(SplitError::CatalogRead(format!(
                "file {} has no chunk for bucket {bucket}",
                rec.id
            )));
        };
        backend.get(id).await.map_err(|source| {
            error!(file_id = %rec.id, bucket, chunk_id = %id, error = %source, "chunk read failed");
            SplitError::ChunkRead {
                bucket,
                id: id.to_string(),
                source,
            }
        })
    }

    /// Reads bucket 0 up front so a download that cannot start fails before any
    /// byte is handed out; the rest follows from a producer task.
    async fn open_stream(&self, rec: &FileRecord) -> Result<ChunkStream> {
        let first = self.read_chunk(rec, 0).await?;

        let (tx, rx) = mpsc::channel(1);
        let buckets = self.buckets.clone();
        let file_id = rec.id;
        let expected = rec.size;
        let ids = rec.chunk_ids.clone();

        tokio::spawn(async move {
            let mut sent = first.len() as u64;
            if tx.send(Ok(first)).await.is_err() {
                debug!(%file_id, "reader went away");
                return;
            }
            for (bucket, (backend, id)) in buckets.iter().zip(ids).enumerate().skip(1) {
                match backend.get(&id).await {
                    Ok(data) => {
                        sent += data.len() as u64;
                        if tx.send(Ok(data)).await.is_err() {
                            debug!(%file_id, bucket, "reader went away");
                            return;
                        }
                    }
                    Err(source) => {
                        error!(%file_id, bucket, chunk_id = %id, error = %source, "chunk read failed mid-stream");
                        let _ = tx
                            .send(Err(SplitError::ChunkRead {
                                bucket,
                                id: id.to_string(),
                                source,
                            }))
                            .await;
                        return;
                    }
                }
            }
            if sent != expected {
                error!(%file_id, expected, actual = sent, "length mismatch");
                let _ = tx
                    .send(Err(SplitError::LengthMismatch {
                        expected,
                        actual: sent,
                    }))
                    .await;
            }
        });

        Ok(ChunkStream {
            inner: Inner::Channel(ReceiverStream::new(rx)),
        })
    }
}
