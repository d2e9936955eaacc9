//! Response descriptors: status, headers and a body source the transport streams to the client.

use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::stream::PackStream;
use super::types::HttpError;
use super::utils::http_date;
use crate::adapter::FileSource;

/// One year, the lifetime of content-addressed files.
pub const CACHE_FOREVER_SECS: u64 = 31_536_000;

/// Caching policy attached to a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// The resource may change between requests: expire immediately and revalidate.
    NoCache,
    /// The resource is content-addressed: immutable for a year.
    Forever,
}

impl CachePolicy {
    fn apply(self, headers: &mut HeaderMap, now: SystemTime) {
        match self {
            CachePolicy::NoCache => {
                insert(headers, header::EXPIRES, "Fri, 01 Jan 1980 00:00:00 GMT");
                insert(headers, header::PRAGMA, "no-cache");
                insert(
                    headers,
                    header::CACHE_CONTROL,
                    "no-cache, max-age=0, must-revalidate",
                );
            }
            CachePolicy::Forever => {
                let expires = now + Duration::from_secs(CACHE_FOREVER_SECS);
                insert(headers, header::DATE, &http_date(now));
                insert(headers, header::EXPIRES, &http_date(expires));
                insert(
                    headers,
                    header::CACHE_CONTROL,
                    &format!("public, max-age={CACHE_FOREVER_SECS}"),
                );
            }
        }
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::warn!("Dropping invalid {} header value {:?}: {}", name, value, e),
    }
}

/// Where the response body comes from.
pub enum ResponseBody {
    /// Fixed in-memory payload.
    Fixed(&'static str),
    /// Lazily read file with a modification time.
    File(FileSource),
    /// Live pack exchange output.
    Stream(PackStream),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Fixed(text) => f.debug_tuple("Fixed").field(text).finish(),
            ResponseBody::File(source) => f.debug_tuple("File").field(source).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Response descriptor handed back to the HTTP transport.
#[derive(Debug)]
pub struct GitResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl GitResponse {
    /// Plain-text error response.
    pub fn error(error: HttpError) -> Self {
        let mut headers = HeaderMap::new();
        insert(&mut headers, header::CONTENT_TYPE, super::types::PLAIN_TEXT);
        Self {
            status: error.status(),
            headers,
            body: ResponseBody::Fixed(error.body()),
        }
    }

    /// 200 serving `source`, with `Last-Modified` taken from the file.
    pub fn file(source: FileSource, content_type: &str, policy: CachePolicy) -> Self {
        let mut headers = HeaderMap::new();
        policy.apply(&mut headers, SystemTime::now());
        insert(&mut headers, header::CONTENT_TYPE, content_type);
        insert(&mut headers, header::LAST_MODIFIED, &http_date(source.modified));
        Self {
            status: StatusCode::OK,
            headers,
            body: ResponseBody::File(source),
        }
    }

    /// 200 whose body is produced by a running pack exchange. Never carries `Last-Modified`.
    pub fn stream(stream: PackStream, content_type: &str, policy: Option<CachePolicy>) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(policy) = policy {
            policy.apply(&mut headers, SystemTime::now());
        }
        insert(&mut headers, header::CONTENT_TYPE, content_type);
        Self {
            status: StatusCode::OK,
            headers,
            body: ResponseBody::Stream(stream),
        }
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for GitResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            ResponseBody::Fixed(text) => Body::from(text),
            ResponseBody::File(source) => Body::from_stream(source.body),
            ResponseBody::Stream(stream) => stream.into_body(),
        };
        (self.status, self.headers, body).into_response()
    }
}
