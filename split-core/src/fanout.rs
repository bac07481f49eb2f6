use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bucket::{BucketBackend, Buckets};
use crate::domain::ChunkId;
use crate::error::{BucketError, Result, SplitError};

/// One chunk destined for one bucket.
#[derive(Clone, Debug)]
pub struct ChunkWrite {
    pub bucket: usize,
    pub id: ChunkId,
    pub data: Bytes,
}

enum Outcome {
    Stored(usize, ChunkId),
    Failed(usize, ChunkId, BucketError),
    Cancelled(usize, ChunkId),
}

/// Writes the N chunks of a file concurrently, one task per bucket.
///
/// The first failure cancels the siblings; every task is joined before the call
/// returns, and chunks that reached (or may have reached) their bucket are deleted
/// again so a failed upload leaves nothing behind.
#[derive(Clone, Debug)]
pub struct FanOutWriter {
    buckets: Buckets,
}

impl FanOutWriter {
    pub fn new(buckets: Buckets) -> Self {
        Self { buckets }
    }

    /// Returns the chunk ids in bucket order once every put has succeeded.
    pub async fn write_all(&self, writes: Vec<ChunkWrite>) -> Result<Vec<ChunkId>> {
        let n = self.buckets.fan_out();
        if writes.len() != n || writes.iter().enumerate().any(|(i, w)| w.bucket != i) {
            return Err(SplitError::Config(format!(
                "fan-out writer expects one write per bucket 0..{n}, got {}",
                writes.len()
            )));
        }

        let token = CancellationToken::new();
        let planned: Vec<ChunkId> = writes.iter().map(|w| w.id.clone()).collect();
        let mut set = JoinSet::new();

        for (w, backend) in writes.into_iter().zip(self.buckets.iter().cloned()) {
            let token = token.clone();
            set.spawn(async move {
                let ChunkWrite { bucket, id, data } = w;
                let len = data.len();
                if token.is_cancelled() {
                    return Outcome::Cancelled(bucket, id);
                }
                let mut put = Box::pin({
                    let backend = backend.clone();
                    let id = id.clone();
                    async move { backend.put(&id, data).await }
                });
                let settled = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    r = &mut put => Some(r),
                };
                match settled {
                    Some(Ok(())) => {
                        debug!(bucket, chunk_id = %id, bytes = len, "chunk written");
                        Outcome::Stored(bucket, id)
                    }
                    Some(Err(e)) => Outcome::Failed(bucket, id, e),
                    None => {
                        settle_then_delete(bucket, id.clone(), put, backend);
                        Outcome::Cancelled(bucket, id)
                    }
                }
            });
        }

        let mut stored: Vec<Option<ChunkId>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut interrupted: Vec<(usize, ChunkId)> = Vec::new();
        let mut first_err: Option<SplitError> = None;
        let mut panicked = false;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Outcome::Stored(bucket, id)) => {
                    settled[bucket] = true;
                    stored[bucket] = Some(id);
                }
                Ok(Outcome::Failed(bucket, id, source)) => {
                    settled[bucket] = true;
                    warn!(bucket, chunk_id = %id, error = %source, "chunk write failed");
                    token.cancel();
                    // the put may have left partial bytes behind
                    interrupted.push((bucket, id.clone()));
                    if first_err.is_none() {
                        first_err = Some(SplitError::ChunkWrite {
                            bucket,
                            id: id.to_string(),
                            source,
                        });
                    }
                }
                Ok(Outcome::Cancelled(bucket, id)) => {
                    settled[bucket] = true;
                    interrupted.push((bucket, id));
                }
                Err(e) => {
                    warn!(error = %e, "chunk writer task aborted");
                    token.cancel();
                    panicked = true;
                }
            }
        }

        if panicked {
            for (bucket, done) in settled.iter().enumerate() {
                if *done {
                    continue;
                }
                let id = planned[bucket].clone();
                if first_err.is_none() {
                    first_err = Some(SplitError::ChunkWrite {
                        bucket,
                        id: id.to_string(),
                        source: BucketError::Io(std::io::Error::other("writer task panicked")),
                    });
                }
                interrupted.push((bucket, id));
            }
        }

        if let Some(err) = first_err {
            let mut leftovers: Vec<(usize, ChunkId)> = stored
                .into_iter()
                .enumerate()
                .filter_map(|(b, id)| id.map(|id| (b, id)))
                .collect();
            leftovers.extend(interrupted);
            self.compensate(&leftovers).await;
            return Err(err);
        }

        Ok(stored.into_iter().flatten().collect())
    }

    /// Best-effort removal of chunks that no catalog record will reference.
    ///
    /// A put interrupted by cancellation may still land after this delete when the
    /// backend runs the write outside the task (`tokio::fs` uses the blocking pool).
    /// Such puts are driven to completion by `settle_then_delete`, which deletes
    /// the chunk again once the put has settled.
    pub async fn compensate(&self, chunks: &[(usize, ChunkId)]) -> usize {
        let mut removed = 0;
        for (bucket, id) in chunks {
            let Some(backend) = self.buckets.get(*bucket) else {
                continue;
            };
            match backend.delete(id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(bucket, chunk_id = %id, error = %e, "orphan chunk left behind"),
            }
        }
        if !chunks.is_empty() {
            debug!(removed, total = chunks.len(), "compensating deletes issued");
        }
        removed
    }
}

/// Keeps polling a cancelled put on a detached task and deletes its chunk once the
/// put settles, so a write that was already past the point of no return is not left
/// behind. The writer does not wait for this.
fn settle_then_delete<F>(
    bucket: usize,
    id: ChunkId,
    put: Pin<Box<F>>,
    backend: Arc<dyn BucketBackend>,
) where
    F: Future<Output = std::result::Result<(), BucketError>> + Send + 'static,
{
    tokio::spawn(async move {
        let _ = put.await;
        if let Err(e) = backend.delete(&id).await {
            warn!(bucket, chunk_id = %id, error = %e, "late chunk left behind");
        }
    });
}
