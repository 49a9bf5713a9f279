use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use headers::{ContentRange, HeaderMapExt};
use log::debug;
use reqwest::{Method, StatusCode};
use tokio::fs::File;
use tokio::io::BufWriter;
use tokio::select;
use tokio_util::sync::CancellationToken;
use crate::download::chunk_plan::ChunkSpec;
use crate::download::context::TransferContext;
use crate::download::error::{DownloadEndCause, DownloadError};
use crate::download::util::{response_stream, send_with_retry, stream_body};

/// One ranged fetch of the plan, streamed into its own temp file.
pub struct ChunkItem {
    ctx: Arc<TransferContext>,
    downloaded: Arc<AtomicU64>,
    pub spec: ChunkSpec,
}

impl ChunkItem {
    pub fn new(ctx: Arc<TransferContext>, spec: ChunkSpec, downloaded: Arc<AtomicU64>) -> Self {
        Self { ctx, downloaded, spec }
    }

    pub async fn download(&self, cancel_token: &CancellationToken) -> Result<DownloadEndCause, DownloadError> {
        // 写入 range 头
        let mut request = self.ctx.request.create_http_request(Method::GET);
        request.headers_mut().typed_insert(self.spec.range.to_range_header()?);

        let response = select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(DownloadEndCause::Cancelled),
            response = send_with_retry(&self.ctx.client, &request, self.ctx.config.request_retry_count) => response?,
        };

        // 200 意味着服务端忽略了 Range，整份数据会污染该 chunk
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::UnexpectedStatus(response.status()));
        }
        self.check_content_range(response.headers())?;

        let file = File::create(&self.spec.temp_path).await?;
        let mut writer = BufWriter::with_capacity(self.ctx.config.transfer_buffer_bytes, file);
        let cause = stream_body(
            response_stream(response),
            &mut writer,
            &self.downloaded,
            cancel_token,
            self.ctx.config.transfer_buffer_bytes,
        ).await?;

        if cause == DownloadEndCause::Finished {
            let expected = self.spec.range.len();
            let received = self.downloaded.load(Ordering::Relaxed);
            if received != expected {
                return Err(DownloadError::IncompleteBody { expected, received });
            }
            debug!("Chunk {} finished: {} bytes", self.spec.index, received);
        }

        Ok(cause)
    }

    /// 长度一致但偏移错误的分片同样会污染合并结果
    fn check_content_range(&self, header_map: &reqwest::header::HeaderMap) -> Result<(), DownloadError> {
        let expected = self.spec.range;
        let received = header_map.typed_get::<ContentRange>().and_then(|range| range.bytes_range());

        match received {
            Some((start, end)) if start == expected.start && end == expected.end => Ok(()),
            _ => Err(DownloadError::RangeMismatch { expected, received }),
        }
    }
}
