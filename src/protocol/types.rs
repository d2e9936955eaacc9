use std::fmt;
use std::str::FromStr;

use axum::http::{StatusCode, Version};

/// Fixed rejections produced before (or instead of) touching repository content.
///
/// Every variant maps to a stateless plain-text response; nothing about the triggering request
/// is echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("Bad Request")]
    BadRequest,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl HttpError {
    /// Method mismatch rejection for a request made with `version`.
    ///
    /// HTTP/1.0 and earlier have no 405, so those clients get a 400 instead.
    pub fn method_not_allowed(version: Version) -> Self {
        if version == Version::HTTP_09 || version == Version::HTTP_10 {
            HttpError::BadRequest
        } else {
            HttpError::MethodNotAllowed
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest => StatusCode::BAD_REQUEST,
            HttpError::Forbidden => StatusCode::FORBIDDEN,
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            HttpError::BadRequest => "Bad Request",
            HttpError::Forbidden => "Forbidden",
            HttpError::NotFound => "Not Found",
            HttpError::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

/// Git service types for smart protocol
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ServiceType {
    UploadPack,
    ReceivePack,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::UploadPack => "git-upload-pack",
            ServiceType::ReceivePack => "git-receive-pack",
        }
    }

    /// Name of the git subcommand implementing this service.
    pub fn command(&self) -> &'static str {
        match self {
            ServiceType::UploadPack => "upload-pack",
            ServiceType::ReceivePack => "receive-pack",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            ServiceType::UploadPack => Direction::Pull,
            ServiceType::ReceivePack => Direction::Push,
        }
    }

    /// `application/x-<service>-request`
    pub fn request_content_type(&self) -> String {
        format!("application/x-{}-request", self.as_str())
    }

    /// `application/x-<service>-result`
    pub fn result_content_type(&self) -> String {
        format!("application/x-{}-result", self.as_str())
    }

    /// `application/x-<service>-advertisement`
    pub fn advertisement_content_type(&self) -> String {
        format!("application/x-{}-advertisement", self.as_str())
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git-upload-pack" => Ok(ServiceType::UploadPack),
            "git-receive-pack" => Ok(ServiceType::ReceivePack),
            _ => Err(HttpError::Forbidden),
        }
    }
}

/// Which way repository data flows for a request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    /// Repository to client.
    Pull,
    /// Client to repository.
    Push,
    /// Refs endpoint before its `service` parameter has been inspected.
    Unknown,
}

impl Direction {
    /// Refine an `Unknown` direction from the refs endpoint's `service` parameter.
    pub fn refine(self, service: Option<&str>) -> Direction {
        match (self, service.map(ServiceType::from_str)) {
            (Direction::Unknown, Some(Ok(service))) => service.direction(),
            (direction, _) => direction,
        }
    }
}

pub const PLAIN_TEXT: &str = "text/plain";
pub const PLAIN_TEXT_UTF8: &str = "text/plain; charset=utf-8";
pub const LOOSE_OBJECT: &str = "application/x-git-loose-object";
pub const PACKED_OBJECTS: &str = "application/x-git-packed-objects";
pub const PACKED_OBJECTS_TOC: &str = "application/x-git-packed-objects-toc";

/// Protocol constants
pub const PKT_LINE_END_MARKER: &[u8; 4] = b"0000";
