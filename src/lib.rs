pub mod download;

pub use download::{DownloadConfig, DownloadError, DownloadHandle, DownloadRequest, DownloadStartError, DownloadState, Downloader};
