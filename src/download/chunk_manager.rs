use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use log::{debug, error};
use tokio::select;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use crate::download::chunk_item::ChunkItem;
use crate::download::chunk_plan::ChunkPlan;
use crate::download::context::TransferContext;
use crate::download::error::{DownloadEndCause, DownloadError};
use crate::download::progress::ProgressCounters;
use crate::download::single::SingleStream;

type DownloadResultType = Result<DownloadEndCause, DownloadError>;

/// Number of tasks currently holding the admission gate, and the most ever seen.
#[derive(Debug, Default)]
pub struct GateGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl GateGauge {
    fn enter(self: &Arc<Self>) -> GateHolder {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GateHolder(self.clone())
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct GateHolder(Arc<GateGauge>);

impl Drop for GateHolder {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded worker pool: one task per chunk, at most `max_parallel_chunks` past the admission gate.
pub struct ChunkManager {
    ctx: Arc<TransferContext>,
    semaphore: Arc<Semaphore>,
    gauge: Arc<GateGauge>,
}

impl ChunkManager {
    pub fn new(ctx: Arc<TransferContext>) -> Self {
        let permits = ctx.config.max_parallel_chunks.max(1);
        Self {
            ctx,
            semaphore: Arc::new(Semaphore::new(permits)),
            gauge: Arc::new(GateGauge::default()),
        }
    }

    pub fn gauge(&self) -> &GateGauge {
        &self.gauge
    }

    /// Runs every chunk of the plan and returns once all tasks ended.
    ///
    /// The first failing chunk cancels its siblings and becomes the result. `counters` must hold
    /// one counter per chunk.
    pub async fn download(&self, plan: &ChunkPlan, counters: &ProgressCounters) -> DownloadResultType {
        // 子 token：chunk 失败时只取消本次下载的兄弟任务
        let cancel_token = self.ctx.cancel_token.child_token();
        let mut futures_unordered = FuturesUnordered::new();

        for spec in &plan.chunks {
            let index = spec.index;
            let item = ChunkItem::new(self.ctx.clone(), spec.clone(), counters.counter(index));
            let future = self.gated(cancel_token.clone(), move |token| async move {
                item.download(&token).await
            });
            futures_unordered.push(async move { (index, future.await) });
        }

        let mut result = Ok(DownloadEndCause::Finished);
        while let Some((chunk_index, joined)) = futures_unordered.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => Err(DownloadError::TaskJoin(err)),
            };

            match outcome {
                Ok(DownloadEndCause::Finished) => {
                    debug!("Chunk {} done", chunk_index);
                }
                Ok(DownloadEndCause::Cancelled) => {
                    if matches!(result, Ok(DownloadEndCause::Finished)) {
                        result = Ok(DownloadEndCause::Cancelled);
                    }
                }
                Err(err) => {
                    error!("Chunk {} failed: {}", chunk_index, err);
                    cancel_token.cancel();
                    if result.is_ok() {
                        result = Err(DownloadError::chunk(chunk_index, err));
                    }
                }
            }
        }

        result
    }

    /// Runs the whole-resource fallback through the same gate.
    pub async fn download_single(&self, counters: &ProgressCounters, expected_len: Option<u64>) -> DownloadResultType {
        let single = SingleStream::new(self.ctx.clone(), counters.counter(0), expected_len);
        let future = self.gated(self.ctx.cancel_token.child_token(), move |token| async move {
            single.download(&token).await
        });

        future.await?
    }

    /// Spawns `task` once a gate permit is acquired. The permit is released when the task ends,
    /// whatever its outcome.
    fn gated<F, Fut>(&self, cancel_token: CancellationToken, task: F) -> tokio::task::JoinHandle<DownloadResultType>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = DownloadResultType> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        let gauge = self.gauge.clone();

        tokio::spawn(async move {
            let permit = select! {
                biased;
                _ = cancel_token.cancelled() => return Ok(DownloadEndCause::Cancelled),
                permit = semaphore.acquire_owned() => permit,
            };
            // 信号量不会被关闭
            let Ok(_permit) = permit else {
                return Ok(DownloadEndCause::Cancelled);
            };
            let _holder = gauge.enter();

            task(cancel_token).await
        })
    }
}
