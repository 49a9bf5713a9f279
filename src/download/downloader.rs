use std::path::Path;
use std::sync::Arc;
use futures_util::Stream;
use log::{error, info, warn};
use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use crate::download::chunk_manager::ChunkManager;
use crate::download::chunk_plan::{plan_transfer, ChunkPlan, TransferMode};
use crate::download::cleanup::TempChunkDir;
use crate::download::config::DownloadConfig;
use crate::download::context::TransferContext;
use crate::download::error::{DownloadEndCause, DownloadError, DownloadStartError};
use crate::download::merger::{merge_chunks, remove_if_exists};
use crate::download::probe::probe;
use crate::download::progress::{ProgressAggregator, ProgressCounters};
use crate::download::request::DownloadRequest;
use crate::download::state::DownloadState;

type DownloadResult = Result<DownloadEndCause, DownloadError>;

/// Entry point: starts download operations sharing one HTTP client and one configuration.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    config: Arc<DownloadConfig>,
}

impl Downloader {
    pub fn new(client: Client, config: DownloadConfig) -> Self {
        Self { client, config: Arc::new(config) }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Starts downloading `request` on the current tokio runtime.
    ///
    /// Fails up front only when the destination cannot be a file in an existing directory;
    /// everything after that is reported through the handle's states.
    pub fn download(&self, request: DownloadRequest) -> Result<DownloadHandle, DownloadStartError> {
        check_destination(&request.destination_path)?;

        let ctx = Arc::new(TransferContext::new(self.client.clone(), request, (*self.config).clone()));
        let cancel_token = ctx.cancel_token.clone();
        let (state_sender, state_receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_download(ctx, state_sender));

        Ok(DownloadHandle {
            state_receiver,
            cancel_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
            task,
        })
    }
}

fn check_destination(path: &Path) -> Result<(), DownloadStartError> {
    if path.file_name().is_none() {
        return Err(DownloadStartError::MissingFileName(path.to_path_buf()));
    }
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            Err(DownloadStartError::DirectoryDoesNotExist(dir.to_path_buf()))
        }
        _ => Ok(()),
    }
}

/// Caller's side of one running download. Dropping it cancels the download.
pub struct DownloadHandle {
    state_receiver: UnboundedReceiver<DownloadState>,
    cancel_token: CancellationToken,
    cancel_on_drop: DropGuard,
    task: JoinHandle<()>,
}

impl DownloadHandle {
    /// Next state, or `None` once the operation ended
    pub async fn recv(&mut self) -> Option<DownloadState> {
        self.state_receiver.recv().await
    }

    /// Requests a cooperative stop. The state sequence then ends without a terminal state.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// The stream owns the handle's drop guard: dropping the stream cancels the download.
    pub fn into_stream(self) -> impl Stream<Item = DownloadState> + 'static {
        let DownloadHandle { state_receiver: mut receiver, cancel_on_drop, .. } = self;

        async_stream::stream! {
            let _cancel_on_drop = cancel_on_drop;
            while let Some(state) = receiver.recv().await {
                yield state;
            }
        }
    }

    /// Drains all states and returns the terminal one, if any
    pub async fn wait(mut self) -> Option<DownloadState> {
        let mut last = None;
        while let Some(state) = self.recv().await {
            if state.is_terminal() {
                last = Some(state);
            }
        }
        last
    }
}

async fn run_download(ctx: Arc<TransferContext>, state_sender: UnboundedSender<DownloadState>) {
    let destination = ctx.request.destination_path.clone();

    match execute(&ctx, &state_sender).await {
        Ok(DownloadEndCause::Finished) => {
            info!("Download completed: {}", destination.display());
            let _ = state_sender.send(DownloadState::Success { path: destination });
        }
        Ok(DownloadEndCause::Cancelled) => {
            info!("Download cancelled: {}", destination.display());
            discard_partial(&destination).await;
        }
        Err(err) => {
            error!("Download failed: {}: {}", destination.display(), err);
            discard_partial(&destination).await;
            let _ = state_sender.send(DownloadState::Error { message: err.to_string() });
        }
    }
}

async fn discard_partial(destination: &Path) {
    if let Err(err) = remove_if_exists(destination).await {
        warn!("Failed to remove incomplete file {}: {}", destination.display(), err);
    }
}

async fn execute(ctx: &Arc<TransferContext>, state_sender: &UnboundedSender<DownloadState>) -> DownloadResult {
    let metadata = probe(&ctx.client, &ctx.request).await;
    if ctx.cancel_token.is_cancelled() {
        return Ok(DownloadEndCause::Cancelled);
    }

    let temp_dir = TempChunkDir::allocate_path(&ctx.config);
    match plan_transfer(&metadata, &ctx.config, &temp_dir) {
        TransferMode::Segmented(plan) => {
            info!(
                "Segmented download of {} ({} bytes, {} chunks)",
                ctx.request.source_url, plan.total_size, plan.len()
            );
            let temp_dir = TempChunkDir::create(temp_dir).await?;
            let result = download_segmented(ctx, &plan, state_sender).await;

            // 无论成功、失败还是取消，都在终态之前清理
            if let Err(err) = temp_dir.remove().await {
                warn!("Failed to remove chunk directory: {}", err);
            }
            result
        }
        TransferMode::SingleStream { total_size } => {
            info!("Single stream download of {} ({:?} bytes)", ctx.request.source_url, total_size);
            download_single(ctx, total_size, state_sender).await
        }
    }
}

async fn download_segmented(
    ctx: &Arc<TransferContext>,
    plan: &ChunkPlan,
    state_sender: &UnboundedSender<DownloadState>,
) -> DownloadResult {
    let counters = ProgressCounters::new(plan.len());
    let chunk_manager = ChunkManager::new(ctx.clone());
    let aggregator = ProgressAggregator::spawn(
        counters.clone(),
        Some(plan.total_size),
        ctx.config.progress_interval(),
        state_sender.clone(),
    );

    let result = chunk_manager.download(plan, &counters).await;
    aggregator.stop().await;

    match result? {
        DownloadEndCause::Cancelled => Ok(DownloadEndCause::Cancelled),
        DownloadEndCause::Finished => {
            merge_chunks(
                plan,
                &ctx.request.destination_path,
                ctx.config.merge_buffer_bytes,
                &ctx.cancel_token,
                state_sender,
            ).await
        }
    }
}

async fn download_single(
    ctx: &Arc<TransferContext>,
    total_size: Option<u64>,
    state_sender: &UnboundedSender<DownloadState>,
) -> DownloadResult {
    let counters = ProgressCounters::new(1);
    let chunk_manager = ChunkManager::new(ctx.clone());
    let aggregator = ProgressAggregator::spawn(
        counters.clone(),
        total_size,
        ctx.config.progress_interval(),
        state_sender.clone(),
    );

    let result = chunk_manager.download_single(&counters, total_size).await;
    aggregator.stop().await;

    result
}
