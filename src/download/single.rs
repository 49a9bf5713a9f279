use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use log::debug;
use reqwest::Method;
use tokio::io::BufWriter;
use tokio::select;
use tokio_util::sync::CancellationToken;
use crate::download::context::TransferContext;
use crate::download::error::{DownloadEndCause, DownloadError};
use crate::download::merger::create_fresh;
use crate::download::util::{response_stream, send_with_retry, stream_body};

/// Whole-resource fetch straight into the destination file, used when segmenting is not possible.
pub struct SingleStream {
    ctx: Arc<TransferContext>,
    downloaded: Arc<AtomicU64>,
    expected_len: Option<u64>,
}

impl SingleStream {
    pub fn new(ctx: Arc<TransferContext>, downloaded: Arc<AtomicU64>, expected_len: Option<u64>) -> Self {
        Self { ctx, downloaded, expected_len }
    }

    pub async fn download(&self, cancel_token: &CancellationToken) -> Result<DownloadEndCause, DownloadError> {
        let request = self.ctx.request.create_http_request(Method::GET);
        let response = select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(DownloadEndCause::Cancelled),
            response = send_with_retry(&self.ctx.client, &request, self.ctx.config.request_retry_count) => response?,
        };

        if !response.status().is_success() {
            return Err(DownloadError::UnexpectedStatus(response.status()));
        }

        let file = create_fresh(&self.ctx.request.destination_path).await?;
        let mut writer = BufWriter::with_capacity(self.ctx.config.transfer_buffer_bytes, file);
        let cause = stream_body(
            response_stream(response),
            &mut writer,
            &self.downloaded,
            cancel_token,
            self.ctx.config.transfer_buffer_bytes,
        ).await?;

        if cause == DownloadEndCause::Finished {
            writer.into_inner().sync_all().await?;

            let received = self.downloaded.load(Ordering::Relaxed);
            if let Some(expected) = self.expected_len {
                if received != expected {
                    return Err(DownloadError::IncompleteBody { expected, received });
                }
            }
            debug!("Single stream finished: {} bytes", received);
        }

        Ok(cause)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use super::*;
    use crate::download::config::DownloadConfig;
    use crate::download::request::DownloadRequest;
    use crate::download::test_utils::{client, payload, ServeOptions, TestServer};

    #[tokio::test]
    async fn should_replace_existing_destination() {
        let data = payload(50_000);
        let server = TestServer::start(data.clone(), ServeOptions::plain()).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        std::fs::write(&destination, vec![0xAA; 80_000]).unwrap();

        let request = DownloadRequest::new(server.url.clone(), &destination);
        let ctx = Arc::new(TransferContext::new(client(), request, DownloadConfig::default()));
        let counter = Arc::new(AtomicU64::new(0));
        let single = SingleStream::new(ctx, counter.clone(), Some(50_000));

        let cause = single.download(&CancellationToken::new()).await.unwrap();
        assert_eq!(cause, DownloadEndCause::Finished);
        assert_eq!(counter.load(Ordering::Relaxed), 50_000);
        assert_eq!(std::fs::read(&destination).unwrap(), data);
    }

    #[tokio::test]
    async fn should_fail_on_missing_resource() {
        let server = TestServer::start(payload(10), ServeOptions::plain()).await;
        let dir = tempfile::tempdir().unwrap();
        let mut url = server.url.clone();
        url.set_path("/missing.bin");

        let request = DownloadRequest::new(url, dir.path().join("out.bin"));
        let ctx = Arc::new(TransferContext::new(client(), request, DownloadConfig::default()));
        let single = SingleStream::new(ctx, Arc::new(AtomicU64::new(0)), None);

        let result = single.download(&CancellationToken::new()).await;
        assert!(matches!(result, Err(DownloadError::UnexpectedStatus(StatusCode::NOT_FOUND))));
        assert!(!dir.path().join("out.bin").exists());
    }
}
