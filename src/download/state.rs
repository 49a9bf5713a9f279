use std::path::PathBuf;
use serde::Serialize;

/// Externally observed state of a download, delivered in order.
///
/// At most one of `Success`/`Error` ends the sequence; a cancelled download ends it without either.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadState {
    Progress {
        percent: u8,
        downloaded: u64,
        total: Option<u64>,
        bytes_per_second: u64,
    },
    Merging {
        percent: u8,
    },
    Success {
        path: PathBuf,
    },
    Error {
        message: String,
    },
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Success { .. } | DownloadState::Error { .. })
    }
}
