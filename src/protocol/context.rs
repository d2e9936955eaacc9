use std::path::PathBuf;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Version, header};
use serde::Deserialize;

use super::auth::AccessPolicy;
use super::route::Resource;
use super::types::Direction;

/// Query parameters understood by the refs endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct InfoRefsParams {
    pub service: Option<String>,
}

/// Everything a handler may look at for one request. Built once by the dispatcher and never
/// shared with another request.
#[derive(Debug)]
pub struct RequestContext<A> {
    pub repository_path: PathBuf,
    /// Adapter bound to `repository_path`, created for this request only.
    pub adapter: Arc<A>,
    pub resource: Resource,
    pub direction: Direction,
    pub method: Method,
    pub version: Version,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    /// `service` query parameter, if any.
    pub service: Option<String>,
    pub policy: AccessPolicy,
    /// Response chunks buffered ahead of a slow client during a pack exchange.
    pub stream_buffer: usize,
}

impl<A> RequestContext<A> {
    /// Assemble the context for a matched request whose adapter already points at an existing
    /// repository.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parts: &Parts,
        repository_path: PathBuf,
        adapter: A,
        resource: Resource,
        direction_hint: Direction,
        service: Option<String>,
        policy: AccessPolicy,
        stream_buffer: usize,
    ) -> Self {
        Self {
            repository_path,
            adapter: Arc::new(adapter),
            resource,
            direction: direction_hint.refine(service.as_deref()),
            method: parts.method.clone(),
            version: parts.version,
            content_type: header_string(&parts.headers, header::CONTENT_TYPE),
            content_encoding: header_string(&parts.headers, header::CONTENT_ENCODING),
            service,
            policy,
            stream_buffer,
        }
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
