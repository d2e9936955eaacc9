//! Repository adapter boundary.
//!
//! The HTTP layer never touches repository state directly. Everything it needs (existence,
//! per-repository push/pull defaults, static files and the pack exchange itself) goes through
//! [`RepositoryAdapter`]. A fresh adapter is built per request by an [`AdapterFactory`], so
//! implementations may keep per-request state without locking.

pub mod git;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::ReaderStream;

use crate::errors::AdapterError;
use crate::protocol::types::ServiceType;

pub use git::GitAdapter;

/// Client input for a pack exchange, already decompressed if the request asked for it.
pub type PackInput = Box<dyn AsyncRead + Send + Unpin>;

/// Live response body the adapter writes exchange output into.
pub type PackOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// Options forwarded to [`RepositoryAdapter::exchange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Only advertise refs and capabilities; there is no client input.
    pub advertise_refs: bool,
}

/// A lazily read byte source bound to a modification time.
pub struct FileSource {
    pub body: BoxStream<'static, io::Result<Bytes>>,
    pub modified: SystemTime,
}

impl FileSource {
    /// Open a regular file for lazy, chunked reading.
    ///
    /// Returns `None` when the path is missing, unreadable or not a regular file.
    pub async fn open(path: &Path) -> Option<FileSource> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("Failed to open {:?}: {}", path, e);
                return None;
            }
        };
        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        Some(FileSource {
            body: ReaderStream::new(file).boxed(),
            modified,
        })
    }

    /// In-memory source, for adapters that do not keep repositories on disk.
    pub fn from_bytes(data: impl Into<Bytes>, modified: SystemTime) -> FileSource {
        let data = data.into();
        FileSource {
            body: stream::once(async move { Ok(data) }).boxed(),
            modified,
        }
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

/// Repository access used by the HTTP handlers.
#[async_trait]
pub trait RepositoryAdapter: Send + Sync {
    /// Bind this adapter to the repository at `path`.
    fn set_repository_path(&mut self, path: PathBuf);

    fn repository_path(&self) -> Option<&Path>;

    /// Whether the bound repository exists.
    async fn exists(&self) -> bool;

    /// Per-repository default for pushes, used when the server leaves `allow_push` unset.
    async fn allow_push(&self) -> bool;

    /// Per-repository default for fetches, used when the server leaves `allow_pull` unset.
    async fn allow_pull(&self) -> bool;

    /// Regenerate the metadata files dumb clients rely on (`info/refs`, `objects/info/packs`).
    async fn refresh_server_info(&self) -> Result<(), AdapterError>;

    /// Open a file by path relative to the repository root.
    async fn open_file(&self, relative_path: &str) -> Option<FileSource>;

    /// Run the pack exchange for `service`, reading client data from `input` and writing the
    /// result to `output` as it is produced.
    async fn exchange(
        &self,
        service: ServiceType,
        input: Option<PackInput>,
        output: PackOutput,
        options: ExchangeOptions,
    ) -> Result<(), AdapterError>;
}

/// Builds one adapter per request.
pub trait AdapterFactory: Send + Sync + 'static {
    type Adapter: RepositoryAdapter + 'static;

    fn create(&self) -> Self::Adapter;
}

impl<F, A> AdapterFactory for F
where
    F: Fn() -> A + Send + Sync + 'static,
    A: RepositoryAdapter + 'static,
{
    type Adapter = A;

    fn create(&self) -> A {
        self()
    }
}

/// Drain a [`FileSource`] into memory. Intended for small files and tests.
pub async fn read_to_end(source: FileSource) -> io::Result<Vec<u8>> {
    let mut body = source.body;
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

/// Read an entire [`PackInput`] into memory.
pub async fn read_input(input: Option<PackInput>) -> io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut out = Vec::new();
    if let Some(mut input) = input {
        input.read_to_end(&mut out).await?;
    }
    Ok(out)
}
