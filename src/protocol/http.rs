//! HTTP dispatcher: sanitizes the request path, walks the route table, applies the request
//! gates and hands the request to the matching resource handler. Exposed both as a plain
//! async function ([`SmartHttp::handle`]) and as an axum [`Router`].

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::response::{IntoResponse, Response};

use super::auth::AccessPolicy;
use super::context::{InfoRefsParams, RequestContext};
use super::handlers;
use super::response::GitResponse;
use super::route::{Resource, route};
use super::types::HttpError;
use super::utils::sanitize_path;
use crate::adapter::{AdapterFactory, GitAdapter, RepositoryAdapter};
use crate::config::ServerConfig;

const DEFAULT_STREAM_BUFFER: usize = 16;

/// Smart HTTP front end over a directory of repositories.
///
/// Configuration is read-only once built; every request gets its own adapter from `factory`.
pub struct SmartHttp<F> {
    root: PathBuf,
    policy: AccessPolicy,
    stream_buffer: usize,
    factory: F,
}

impl<F: AdapterFactory> SmartHttp<F> {
    /// Serve repositories under `root`, deferring push/pull decisions to each repository.
    pub fn new(root: impl Into<PathBuf>, factory: F) -> Self {
        Self {
            root: root.into(),
            policy: AccessPolicy::default(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            factory,
        }
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_stream_buffer(mut self, chunks: usize) -> Self {
        self.stream_buffer = chunks.max(1);
        self
    }

    pub fn from_config(config: &ServerConfig, factory: F) -> Self {
        Self::new(config.root.clone(), factory)
            .with_policy(config.policy())
            .with_stream_buffer(config.stream_buffer)
    }

    /// Handle one request. Never fails: every rejection becomes a plain-text error response.
    pub async fn handle(&self, request: Request<Body>) -> GitResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => GitResponse::error(error),
        }
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<GitResponse, HttpError> {
        let (parts, body) = request.into_parts();
        let path = sanitize_path(parts.uri.path()).ok_or(HttpError::BadRequest)?;
        let matched = route(&path, &parts.method, parts.version)?;

        let repository_path = self.root.join(&matched.repository);
        let mut adapter = self.factory.create();
        adapter.set_repository_path(repository_path.clone());
        if !adapter.exists().await {
            tracing::debug!("Repository {:?} not found", repository_path);
            return Err(HttpError::NotFound);
        }

        let params = match Query::<InfoRefsParams>::try_from_uri(&parts.uri) {
            Ok(Query(params)) => params,
            Err(e) => {
                tracing::debug!("Ignoring unparsable query string: {}", e);
                InfoRefsParams::default()
            }
        };

        let ctx = RequestContext::new(
            &parts,
            repository_path,
            adapter,
            matched.resource.clone(),
            matched.rule.direction,
            params.service,
            self.policy,
            self.stream_buffer,
        );
        tracing::debug!(
            repo = ?ctx.repository_path,
            resource = ?ctx.resource,
            direction = ?ctx.direction,
            "dispatching"
        );

        match &matched.resource {
            Resource::PackRpc { pack_type } => handlers::handle_pack(&ctx, pack_type, body).await,
            Resource::InfoRefs => handlers::handle_info_refs(&ctx).await,
            Resource::TextFile { path } => handlers::handle_text_file(&ctx, path).await,
            Resource::InfoPacks { path } => handlers::handle_info_packs(&ctx, path).await,
            Resource::LooseObject { path } => handlers::handle_loose_object(&ctx, path).await,
            Resource::PackFile { path } => handlers::handle_pack_file(&ctx, path).await,
            Resource::IdxFile { path } => handlers::handle_idx_file(&ctx, path).await,
        }
    }

    /// Mount the server as a catch-all axum router.
    pub fn router(self) -> Router {
        Router::new()
            .fallback(serve::<F>)
            .with_state(Arc::new(self))
    }
}

impl SmartHttp<Box<dyn Fn() -> GitAdapter + Send + Sync>> {
    /// Server backed by the `git` executable named in `config`.
    pub fn git(config: &ServerConfig) -> Self {
        let git_path = config.git_path.clone();
        let factory: Box<dyn Fn() -> GitAdapter + Send + Sync> =
            Box::new(move || GitAdapter::new(git_path.clone()));
        Self::from_config(config, factory)
    }
}

async fn serve<F: AdapterFactory>(
    State(server): State<Arc<SmartHttp<F>>>,
    request: Request,
) -> Response {
    server.handle(request).await.into_response()
}
