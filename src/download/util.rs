use std::sync::atomic::{AtomicU64, Ordering};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::warn;
use reqwest::{Client, Request, Response};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use crate::download::error::{DownloadEndCause, DownloadError};

pub fn clone_request(request: &Request) -> Request {
    let mut req = Request::new(request.method().clone(), request.url().clone());
    *req.headers_mut() = request.headers().clone();
    *req.version_mut() = request.version();
    *req.timeout_mut() = request.timeout().map(Clone::clone);

    req
}

/// 发送请求，发送失败或 5xx 时最多重试 `retry_count` 次
///
/// Only the request itself is retried, never a body that already started streaming.
pub async fn send_with_retry(client: &Client, request: &Request, retry_count: u8) -> Result<Response, DownloadError> {
    let mut attempts = 0;
    loop {
        let result = client.execute(clone_request(request)).await;
        let retryable = match &result {
            Ok(response) => response.status().is_server_error(),
            Err(_) => true,
        };

        if !retryable || attempts >= retry_count {
            return Ok(result?);
        }

        attempts += 1;
        match result {
            Ok(response) => warn!("Request {} answered {}, retry {}/{}", request.url(), response.status(), attempts, retry_count),
            Err(err) => warn!("Request {} failed, retry {}/{}: {}", request.url(), attempts, retry_count, err),
        }
    }
}

/// Copies a body stream into `writer` in pieces of at most `buffer_size` bytes.
///
/// `counter` grows after every piece written. The token is raced against every network read and
/// checked before every write, so a cancelled transfer stops at most one piece late.
pub async fn stream_body<S, E, W>(
    mut stream: S,
    writer: &mut W,
    counter: &AtomicU64,
    cancel_token: &CancellationToken,
    buffer_size: usize,
) -> Result<DownloadEndCause, DownloadError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    DownloadError: From<E>,
    W: AsyncWrite + Unpin,
{
    let buffer_size = buffer_size.max(1);
    loop {
        let next = select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(DownloadEndCause::Cancelled),
            next = stream.next() => next,
        };

        let bytes = match next {
            Some(bytes) => bytes?,
            None => break,
        };

        for piece in bytes.chunks(buffer_size) {
            if cancel_token.is_cancelled() {
                return Ok(DownloadEndCause::Cancelled);
            }
            writer.write_all(piece).await?;
            counter.fetch_add(piece.len() as u64, Ordering::Relaxed);
        }
    }

    writer.flush().await?;

    Ok(DownloadEndCause::Finished)
}

/// Body stream of a response, boxed so callers can stay generic over [`stream_body`]
pub fn response_stream(response: Response) -> impl Stream<Item = reqwest::Result<Bytes>> + Unpin {
    Box::pin(response.bytes_stream())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use futures_util::stream;
    use super::*;

    #[tokio::test]
    async fn should_write_in_bounded_pieces() {
        let data = vec![7u8; 20_000];
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(data.clone()))]);
        let counter = AtomicU64::new(0);
        let mut out = Vec::new();

        let cause = stream_body(body, &mut out, &counter, &CancellationToken::new(), 8192).await.unwrap();
        assert_eq!(cause, DownloadEndCause::Finished);
        assert_eq!(out, data);
        assert_eq!(counter.load(Ordering::Relaxed), 20_000);
    }

    #[tokio::test]
    async fn should_propagate_stream_error() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let counter = AtomicU64::new(0);
        let mut out = Vec::new();

        let result = stream_body(body, &mut out, &counter, &CancellationToken::new(), 8192).await;
        assert!(matches!(result, Err(DownloadError::IOError(_))));
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn should_stop_within_one_piece_after_cancel() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicU64::new(0));

        // 无尽的 body，每次 8 KiB
        let body = stream::repeat_with(|| Ok::<_, std::io::Error>(Bytes::from(vec![1u8; 8192])))
            .then(|item| async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                item
            })
            .boxed();

        let task = {
            let token = token.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut sink = tokio::io::sink();
                stream_body(body, &mut sink, &counter, &token, 8192).await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        let at_cancel = counter.load(Ordering::Relaxed);

        let cause = task.await.unwrap().unwrap();
        assert_eq!(cause, DownloadEndCause::Cancelled);
        let after = counter.load(Ordering::Relaxed);
        assert!(after <= at_cancel + 8192, "grew from {} to {}", at_cancel, after);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::Relaxed), after);
    }
}
