use reqwest::Client;
use tokio_util::sync::CancellationToken;
use crate::download::config::DownloadConfig;
use crate::download::request::DownloadRequest;

/// Everything one download operation shares with its tasks. Each operation owns its own context,
/// so concurrent downloads never observe each other.
pub struct TransferContext {
    // Client 内部拥有一个连接池且默认拥有一个 Arc 包裹，所以直接 clone 复用
    pub client: Client,
    pub request: DownloadRequest,
    pub config: DownloadConfig,
    pub cancel_token: CancellationToken,
}

impl TransferContext {
    pub fn new(client: Client, request: DownloadRequest, config: DownloadConfig) -> Self {
        Self {
            client,
            request,
            config,
            cancel_token: CancellationToken::new(),
        }
    }
}
