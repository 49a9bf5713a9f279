use headers::HeaderMapExt;
use log::{debug, warn};
use reqwest::header::ACCEPT_RANGES;
use reqwest::{Client, Method};
use crate::download::error::DownloadError;
use crate::download::request::DownloadRequest;

/// What the server told us about the resource before any body was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceMetadata {
    /// `None` when `Content-Length` is missing or unparsable
    pub total_size: Option<u64>,
    pub supports_range_requests: bool,
}

impl ResourceMetadata {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Issues a single `HEAD` request. Never fails: any error degrades to [`ResourceMetadata::unknown`],
/// which plans a single-stream transfer.
pub async fn probe(client: &Client, request: &DownloadRequest) -> ResourceMetadata {
    match try_probe(client, request).await {
        Ok(metadata) => {
            debug!("Probed {}: {:?}", request.source_url, metadata);
            metadata
        }
        Err(err) => {
            warn!("Probe of {} failed, falling back to single stream: {}", request.source_url, err);
            ResourceMetadata::unknown()
        }
    }
}

async fn try_probe(client: &Client, request: &DownloadRequest) -> Result<ResourceMetadata, DownloadError> {
    let response = client
        .execute(request.create_http_request(Method::HEAD))
        .await?
        .error_for_status()?;
    let header_map = response.headers();

    let total_size = header_map.typed_get::<headers::ContentLength>().map(|len| len.0);
    let supports_range_requests = header_map
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("bytes"));

    Ok(ResourceMetadata { total_size, supports_range_requests })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::test_utils::{client, payload, ServeOptions, TestServer};

    #[tokio::test]
    async fn should_detect_range_support() {
        let server = TestServer::start(payload(4096), ServeOptions::ranged()).await;
        let request = DownloadRequest::new(server.url.clone(), "unused");

        let metadata = probe(&client(), &request).await;
        assert_eq!(metadata, ResourceMetadata { total_size: Some(4096), supports_range_requests: true });
    }

    #[tokio::test]
    async fn should_report_no_range_support() {
        let server = TestServer::start(payload(4096), ServeOptions::plain()).await;
        let request = DownloadRequest::new(server.url.clone(), "unused");

        let metadata = probe(&client(), &request).await;
        assert_eq!(metadata.total_size, Some(4096));
        assert!(!metadata.supports_range_requests);
    }

    #[tokio::test]
    async fn should_degrade_when_head_rejected() {
        let options = ServeOptions { head_allowed: false, ..ServeOptions::ranged() };
        let server = TestServer::start(payload(4096), options).await;
        let request = DownloadRequest::new(server.url.clone(), "unused");

        assert_eq!(probe(&client(), &request).await, ResourceMetadata::unknown());
    }

    #[tokio::test]
    async fn should_degrade_when_unreachable() {
        let url = url::Url::parse("http://127.0.0.1:9/file.bin").unwrap();
        let request = DownloadRequest::new(url, "unused");

        assert_eq!(probe(&client(), &request).await, ResourceMetadata::unknown());
    }
}
