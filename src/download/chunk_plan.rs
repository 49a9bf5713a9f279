use std::path::{Path, PathBuf};
use crate::download::chunk_range::ChunkRange;
use crate::download::config::DownloadConfig;
use crate::download::probe::ResourceMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: usize,
    pub range: ChunkRange,
    pub temp_path: PathBuf,
}

/// Gapless partition of `[0, total_size)`, ordered by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub total_size: u64,
    pub chunks: Vec<ChunkSpec>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMode {
    Segmented(ChunkPlan),
    SingleStream { total_size: Option<u64> },
}

/// Size of a resource eligible for segmented transfer, or `None` for single-stream mode.
pub fn segmentable_size(metadata: &ResourceMetadata, config: &DownloadConfig) -> Option<u64> {
    match metadata.total_size {
        Some(total) if metadata.supports_range_requests && total > config.segmented_threshold_bytes => Some(total),
        _ => None,
    }
}

pub fn chunk_count(total_size: u64, config: &DownloadConfig) -> u64 {
    let parallel = config.max_parallel_chunks.max(1) as u64;
    let max_chunk = config.max_chunk_bytes.max(1);

    let count = if total_size / parallel > max_chunk {
        total_size.div_ceil(max_chunk)
    } else {
        parallel
    };

    // 每个 chunk 至少 1 字节
    count.min(total_size).max(1)
}

pub fn chunk_temp_path(temp_dir: &Path, index: usize) -> PathBuf {
    temp_dir.join(format!("chunk_{}.part", index))
}

/// Splits `total_size` bytes into equally sized chunks, the last one absorbing the remainder.
/// An empty resource yields an empty plan.
pub fn plan_chunks(total_size: u64, config: &DownloadConfig, temp_dir: &Path) -> ChunkPlan {
    if total_size == 0 {
        return ChunkPlan { total_size, chunks: Vec::new() };
    }

    let count = chunk_count(total_size, config);
    let chunk_size = total_size / count;

    let chunks = (0..count as usize)
        .map(|index| {
            let start = index as u64 * chunk_size;
            let end = if index as u64 == count - 1 {
                total_size - 1
            } else {
                start + chunk_size - 1
            };

            ChunkSpec {
                index,
                range: ChunkRange::new(start, end),
                temp_path: chunk_temp_path(temp_dir, index),
            }
        })
        .collect();

    ChunkPlan { total_size, chunks }
}

pub fn plan_transfer(metadata: &ResourceMetadata, config: &DownloadConfig, temp_dir: &Path) -> TransferMode {
    match segmentable_size(metadata, config) {
        Some(total) => TransferMode::Segmented(plan_chunks(total, config, temp_dir)),
        None => TransferMode::SingleStream { total_size: metadata.total_size },
    }
}
