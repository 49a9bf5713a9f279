use std::path::PathBuf;
use headers::HeaderMapExt;
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Method, Request};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("turbo-downloader/", env!("CARGO_PKG_VERSION"));

/// What to fetch and where to put it. Consumed by exactly one download operation.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source_url: Url,
    pub destination_path: PathBuf,
    pub user_agent: String,
}

impl DownloadRequest {
    pub fn new(source_url: Url, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url,
            destination_path: destination_path.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn create_http_request(&self, method: Method) -> Request {
        let mut request = Request::new(method, self.source_url.clone());
        let header_map = request.headers_mut();

        // 非法的 UA 直接忽略，交由 client 默认值处理
        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            header_map.insert(USER_AGENT, agent);
        }
        header_map.insert(ACCEPT, HeaderValue::from_static("*/*"));
        header_map.typed_insert(headers::Connection::keep_alive());

        request
    }
}
