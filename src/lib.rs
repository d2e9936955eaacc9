//! git-smart-http: a Git Smart HTTP (and dumb HTTP) server core.
//!
//! Core Capabilities
//! - Routing: an ordered, first-match-wins table covering `git-upload-pack`, `git-receive-pack`,
//!   `info/refs` and the static files dumb clients fetch.
//! - Authorization: server-wide push/pull flags that fall back to each repository's own
//!   `http.receivepack` / `http.uploadpack` settings.
//! - Streaming: pack exchanges stream both ways with bounded buffering; gzip request bodies are
//!   decoded on the fly.
//! - Caching: no-cache headers for mutable files, a one-year policy for content-addressed ones.
//!
//! Modules
//! - `protocol`: routing, handlers, response descriptors and the axum dispatcher.
//! - `adapter`: the repository boundary and the `git`-executable backed implementation.
//! - `config`: server configuration.
//! - `errors`: unified error types.

pub mod adapter;
pub mod config;
pub mod errors;
pub mod protocol;

pub use adapter::{AdapterFactory, FileSource, GitAdapter, RepositoryAdapter};
pub use config::ServerConfig;
pub use protocol::{AccessPolicy, GitResponse, HttpError, ServiceType, SmartHttp};
