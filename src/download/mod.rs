//!
//! # 分段下载模块
//! Probe → plan → bounded fetch (with progress) → ordered merge → cleanup
//!

pub mod chunk_item;
pub mod chunk_manager;
pub mod chunk_plan;
pub mod chunk_range;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod downloader;
pub mod error;
pub mod logger;
pub mod merger;
pub mod probe;
pub mod progress;
pub mod request;
pub mod single;
pub mod state;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::DownloadConfig;
pub use downloader::{DownloadHandle, Downloader};
pub use error::{DownloadError, DownloadStartError};
pub use request::DownloadRequest;
pub use state::DownloadState;
