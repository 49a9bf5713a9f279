//!
//! 配置模块
//!

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};

pub const MIB: u64 = 1024 * 1024;

/// Tunables of a download operation, loadable from JSON. Missing fields fall back to the defaults.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    /// Admission gate size, also the chunk count for mid-sized resources
    pub max_parallel_chunks: usize,
    pub max_chunk_bytes: u64,
    /// Resources must be strictly larger than this to be segmented
    pub segmented_threshold_bytes: u64,
    pub transfer_buffer_bytes: usize,
    pub merge_buffer_bytes: usize,
    pub progress_interval_ms: u64,
    /// Re-sends of a request that failed before any body byte arrived
    pub request_retry_count: u8,
    /// Parent of the per-operation chunk directories
    pub temp_dir: Option<PathBuf>,
}

impl DownloadConfig {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let config_data = fs::read_to_string(file_path)
            .with_context(|| format!("Read config failed: {}", file_path.display()))?;
        let config: DownloadConfig = serde_json::from_str(&config_data)
            .with_context(|| format!("Parse config failed: {}", file_path.display()))?;

        Ok(config)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn temp_root(&self) -> PathBuf {
        match &self.temp_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("turbo-downloader"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_parallel_chunks: 7,
            max_chunk_bytes: 10 * MIB,
            segmented_threshold_bytes: 10 * MIB,
            transfer_buffer_bytes: 8 * 1024,
            merge_buffer_bytes: 128 * 1024,
            progress_interval_ms: 500,
            request_retry_count: 0,
            temp_dir: None,
        }
    }
}
