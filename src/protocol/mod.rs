//! Smart HTTP protocol layer.
//!
//! Requests flow through [`http::SmartHttp`]: the path is sanitized and matched against the
//! ordered [`route::ROUTES`] table, the request gates run, and the matching handler in
//! [`handlers`] authorizes and produces a [`response::GitResponse`].
pub mod auth;
pub mod context;
pub mod handlers;
pub mod http;
pub mod response;
pub mod route;
pub mod stream;
pub mod types;
pub mod utils;

pub use auth::{Access, AccessPolicy};
pub use http::SmartHttp;
pub use response::{CachePolicy, GitResponse, ResponseBody};
pub use route::{Resource, ResourceKind, RouteMatch, match_route};
pub use types::*;
