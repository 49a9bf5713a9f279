use std::path::PathBuf;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io;
use crate::download::chunk_range::ChunkRange;

/// 下载中发生的错误
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Http request failed: {0}")]
    HttpRequestFailed(#[from] reqwest::Error),

    #[error("IOError: {0}")]
    IOError(#[from] io::Error),

    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("Body length mismatch: received {received} of {expected} bytes")]
    IncompleteBody {
        expected: u64,
        received: u64,
    },

    #[error("Invalid byte range {0:?}")]
    InvalidRange(ChunkRange),

    #[error("Server answered range {received:?} for requested {expected:?}")]
    RangeMismatch {
        expected: ChunkRange,
        received: Option<(u64, u64)>,
    },

    #[error("Chunk {index} failed: {source}")]
    ChunkFailed {
        index: usize,
        #[source]
        source: Box<DownloadError>,
    },

    #[error("Merging chunk {index} failed: {source}")]
    MergeFailed {
        index: usize,
        #[source]
        source: io::Error,
    },

    #[error("Worker task panicked or was aborted: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl DownloadError {
    pub fn chunk(index: usize, err: DownloadError) -> Self {
        DownloadError::ChunkFailed { index, source: Box::new(err) }
    }
}

/// 无法开始下载的原因
#[derive(Error, Debug)]
pub enum DownloadStartError {
    #[error("Destination directory does not exist: {0:?}")]
    DirectoryDoesNotExist(PathBuf),

    #[error("Destination path has no file name: {0:?}")]
    MissingFileName(PathBuf),
}

/// 下载结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEndCause {
    Finished,
    Cancelled,
}
