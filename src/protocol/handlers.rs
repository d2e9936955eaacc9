//! Resource handlers. Each one authorizes first and only then asks the adapter for repository
//! content; error responses never reach this module.

use std::io;
use std::sync::Arc;

use axum::body::Body;

use super::context::RequestContext;
use super::response::{CachePolicy, GitResponse};
use super::stream::{is_gzip, pack_channel, request_reader};
use super::types::{
    Direction, HttpError, LOOSE_OBJECT, PACKED_OBJECTS, PACKED_OBJECTS_TOC, PLAIN_TEXT,
    PLAIN_TEXT_UTF8, ServiceType,
};
use crate::adapter::{ExchangeOptions, PackInput, RepositoryAdapter};

type HandlerResult = Result<GitResponse, HttpError>;

async fn require<A>(ctx: &RequestContext<A>, direction: Direction) -> Result<(), HttpError>
where
    A: RepositoryAdapter,
{
    if ctx.policy.authorized(direction, &*ctx.adapter).await {
        Ok(())
    } else {
        tracing::debug!(repo = ?ctx.repository_path, ?direction, "access denied");
        Err(HttpError::Forbidden)
    }
}

/// Smart HTTP RPC endpoint (`git-upload-pack` / `git-receive-pack`).
///
/// An unknown pack type, a content type other than `application/x-<pack_type>-request` or a
/// denied policy answers 403.
pub async fn handle_pack<A>(ctx: &RequestContext<A>, pack_type: &str, body: Body) -> HandlerResult
where
    A: RepositoryAdapter + 'static,
{
    let service: ServiceType = pack_type.parse()?;
    if ctx.content_type.as_deref() != Some(service.request_content_type().as_str()) {
        tracing::debug!(
            content_type = ?ctx.content_type,
            %service,
            "rejected pack request content type"
        );
        return Err(HttpError::Forbidden);
    }
    require(ctx, service.direction()).await?;

    let input = request_reader(body, is_gzip(ctx.content_encoding.as_deref()));
    Ok(exchange_pack(
        ctx,
        service,
        Some(input),
        &service.result_content_type(),
        None,
        ExchangeOptions::default(),
    ))
}

/// `info/refs`: smart ref advertisement when `service` names a pack service, the static
/// `info/refs` file for dumb clients when it is absent, 404 for anything else.
pub async fn handle_info_refs<A>(ctx: &RequestContext<A>) -> HandlerResult
where
    A: RepositoryAdapter + 'static,
{
    require(ctx, ctx.direction).await?;

    let Some(name) = ctx.service.as_deref() else {
        if let Err(e) = ctx.adapter.refresh_server_info().await {
            tracing::warn!("Failed to refresh server info for {:?}: {}", ctx.repository_path, e);
        }
        return send_file(ctx, "info/refs", PLAIN_TEXT_UTF8, CachePolicy::NoCache).await;
    };

    let service: ServiceType = name.parse().map_err(|_| HttpError::NotFound)?;
    Ok(exchange_pack(
        ctx,
        service,
        None,
        &service.advertisement_content_type(),
        Some(CachePolicy::NoCache),
        ExchangeOptions {
            advertise_refs: true,
        },
    ))
}

/// `HEAD`, `objects/info/alternates`, `objects/info/http-alternates` and other
/// `objects/info/*` files.
pub async fn handle_text_file<A>(ctx: &RequestContext<A>, path: &str) -> HandlerResult
where
    A: RepositoryAdapter,
{
    require(ctx, Direction::Pull).await?;
    send_file(ctx, path, PLAIN_TEXT, CachePolicy::NoCache).await
}

/// `objects/info/packs`
pub async fn handle_info_packs<A>(ctx: &RequestContext<A>, path: &str) -> HandlerResult
where
    A: RepositoryAdapter,
{
    require(ctx, Direction::Pull).await?;
    send_file(ctx, path, PLAIN_TEXT_UTF8, CachePolicy::NoCache).await
}

/// `objects/xx/<38 hex>`
pub async fn handle_loose_object<A>(ctx: &RequestContext<A>, path: &str) -> HandlerResult
where
    A: RepositoryAdapter,
{
    require(ctx, Direction::Pull).await?;
    send_file(ctx, path, LOOSE_OBJECT, CachePolicy::Forever).await
}

/// `objects/pack/pack-<40 hex>.pack`
pub async fn handle_pack_file<A>(ctx: &RequestContext<A>, path: &str) -> HandlerResult
where
    A: RepositoryAdapter,
{
    require(ctx, Direction::Pull).await?;
    send_file(ctx, path, PACKED_OBJECTS, CachePolicy::Forever).await
}

/// `objects/pack/pack-<40 hex>.idx`
pub async fn handle_idx_file<A>(ctx: &RequestContext<A>, path: &str) -> HandlerResult
where
    A: RepositoryAdapter,
{
    require(ctx, Direction::Pull).await?;
    send_file(ctx, path, PACKED_OBJECTS_TOC, CachePolicy::Forever).await
}

/// Serve a repository file, or 404 when the adapter can't produce it.
async fn send_file<A>(
    ctx: &RequestContext<A>,
    path: &str,
    content_type: &str,
    policy: CachePolicy,
) -> HandlerResult
where
    A: RepositoryAdapter,
{
    let source = ctx
        .adapter
        .open_file(path)
        .await
        .ok_or(HttpError::NotFound)?;
    Ok(GitResponse::file(source, content_type, policy))
}

/// Commit the response headers and start the adapter exchange behind them.
///
/// The exchange runs on its own task and writes into a bounded channel that backs the response
/// body. If it fails part way through, the body is ended with an error; bytes already sent stay
/// sent.
fn exchange_pack<A>(
    ctx: &RequestContext<A>,
    service: ServiceType,
    input: Option<PackInput>,
    content_type: &str,
    policy: Option<CachePolicy>,
    options: ExchangeOptions,
) -> GitResponse
where
    A: RepositoryAdapter + 'static,
{
    let (sink, stream, abort) = pack_channel(ctx.stream_buffer);
    let adapter = Arc::clone(&ctx.adapter);
    let repo = ctx.repository_path.clone();

    tokio::spawn(async move {
        tracing::info!(%service, ?repo, advertise = options.advertise_refs, "pack exchange started");
        match adapter.exchange(service, input, Box::new(sink), options).await {
            Ok(()) => tracing::info!(%service, ?repo, "pack exchange finished"),
            Err(e) => {
                tracing::warn!("Pack exchange for {:?} ({}) failed: {}", repo, service, e);
                abort.abort(io::Error::other(e)).await;
            }
        }
    });

    GitResponse::stream(stream, content_type, policy)
}
