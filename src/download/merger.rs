use std::io::ErrorKind;
use std::path::Path;
use log::debug;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use crate::download::chunk_plan::ChunkPlan;
use crate::download::error::{DownloadEndCause, DownloadError};
use crate::download::state::DownloadState;

/// 删除已存在的文件后重新创建
pub async fn create_fresh(path: &Path) -> std::io::Result<File> {
    remove_if_exists(path).await?;
    File::create(path).await
}

pub async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Concatenates the plan's temp files into `destination` in index order.
///
/// Each temp file is deleted as soon as it has been appended, and a `Merging` state follows every
/// append. Must only run once every chunk finished.
pub async fn merge_chunks(
    plan: &ChunkPlan,
    destination: &Path,
    buffer_size: usize,
    cancel_token: &CancellationToken,
    state_sender: &UnboundedSender<DownloadState>,
) -> Result<DownloadEndCause, DownloadError> {
    let mut output = create_fresh(destination).await?;
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let total_chunks = plan.len();

    for (appended, chunk) in plan.chunks.iter().enumerate() {
        if cancel_token.is_cancelled() {
            return Ok(DownloadEndCause::Cancelled);
        }

        let result = async {
            append_file(&chunk.temp_path, &mut output, &mut buffer).await?;
            fs::remove_file(&chunk.temp_path).await
        }.await;
        result.map_err(|source| DownloadError::MergeFailed { index: chunk.index, source })?;

        debug!("Merged chunk {} from {}", chunk.index, chunk.temp_path.display());
        let percent = ((appended + 1) * 100 / total_chunks) as u8;
        let _ = state_sender.send(DownloadState::Merging { percent });
    }

    output.sync_all().await?;

    Ok(DownloadEndCause::Finished)
}

async fn append_file(source: &Path, output: &mut File, buffer: &mut [u8]) -> std::io::Result<u64> {
    let mut input = File::open(source).await?;
    let mut copied = 0;
    loop {
        let read = input.read(buffer).await?;
        if read == 0 {
            break;
        }
        output.write_all(&buffer[..read]).await?;
        copied += read as u64;
    }

    Ok(copied)
}
