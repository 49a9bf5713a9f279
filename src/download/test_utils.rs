//! In-process HTTP server used by the download tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;
use url::Url;

pub const PIECE: usize = 8 * 1024;

/// Client that never routes the loopback server through an environment proxy
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Deterministic, non-repeating-per-chunk payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 11)) as u8).collect()
}

#[derive(Clone, Default)]
pub struct ServeOptions {
    pub accept_ranges: bool,
    pub head_allowed: bool,
    /// Ranged requests starting at this offset answer 500
    pub fail_range_start: Option<u64>,
    /// Serve every range one byte later than requested, with a matching `Content-Range`
    pub misplace_ranges: bool,
    /// Delay before every 8 KiB piece of a body
    pub throttle: Option<Duration>,
}

impl ServeOptions {
    pub fn ranged() -> Self {
        Self { accept_ranges: true, head_allowed: true, ..Default::default() }
    }

    pub fn plain() -> Self {
        Self { accept_ranges: false, head_allowed: true, ..Default::default() }
    }
}

struct ServerState {
    data: Bytes,
    options: ServeOptions,
    gets: AtomicUsize,
}

pub struct TestServer {
    pub url: Url,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn start(data: Vec<u8>, options: ServeOptions) -> Self {
        let state = Arc::new(ServerState {
            data: Bytes::from(data),
            options,
            gets: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/file.bin", get(serve).head(serve))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{}/file.bin", addr)).unwrap(),
            state,
        }
    }

    pub fn get_count(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }
}

fn parse_range(headers: &HeaderMap) -> Option<(u64, u64)> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

async fn serve(State(state): State<Arc<ServerState>>, method: Method, headers: HeaderMap) -> Response<Body> {
    let total = state.data.len() as u64;
    let mut builder = Response::builder();
    if state.options.accept_ranges {
        builder = builder.header(header::ACCEPT_RANGES, "bytes");
    }

    if method == Method::HEAD {
        if !state.options.head_allowed {
            return builder.status(StatusCode::METHOD_NOT_ALLOWED).body(Body::empty()).unwrap();
        }
        return builder
            .header(header::CONTENT_LENGTH, total)
            .body(Body::empty())
            .unwrap();
    }

    state.gets.fetch_add(1, Ordering::SeqCst);
    let range = if state.options.accept_ranges { parse_range(&headers) } else { None };
    let (status, slice) = match range {
        Some((start, end)) => {
            if state.options.fail_range_start == Some(start) {
                return builder.status(StatusCode::INTERNAL_SERVER_ERROR).body(Body::empty()).unwrap();
            }
            let (start, end) = if state.options.misplace_ranges { (start + 1, end + 1) } else { (start, end) };
            if end < start || end >= total {
                return builder.status(StatusCode::RANGE_NOT_SATISFIABLE).body(Body::empty()).unwrap();
            }
            builder = builder.header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total));
            (StatusCode::PARTIAL_CONTENT, state.data.slice(start as usize..=end as usize))
        }
        None => (StatusCode::OK, state.data.clone()),
    };

    let throttle = state.options.throttle;
    let slice_len = slice.len();

    let body = async_stream::stream! {
        let mut offset = 0;
        while offset < slice.len() {
            if let Some(delay) = throttle {
                tokio::time::sleep(delay).await;
            }
            let end = (offset + PIECE).min(slice.len());
            yield Ok::<Bytes, std::io::Error>(slice.slice(offset..end));
            offset = end;
        }
    };

    builder
        .status(status)
        .header(header::CONTENT_LENGTH, slice_len)
        .body(Body::from_stream(body))
        .unwrap()
}
