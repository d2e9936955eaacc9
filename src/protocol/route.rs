//! Ordered route table for the Smart HTTP and dumb-protocol endpoints.
//!
//! Rules are evaluated in declaration order and the first pattern that matches wins. Order is
//! load-bearing: the specific `objects/info/*` rules must come before the generic
//! `objects/info/[^/]+` catch-all.

use std::sync::LazyLock;

use axum::http::{Method, Version};
use regex::{Captures, Regex};

use super::types::{Direction, HttpError};
use super::utils::has_traversal_segment;

/// What a matched rule serves, without its captured data.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResourceKind {
    PackRpc,
    InfoRefs,
    TextFile,
    InfoPacks,
    LooseObject,
    PackFile,
    IdxFile,
}

/// A matched resource, carrying only the captures its handler needs.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Resource {
    PackRpc { pack_type: String },
    InfoRefs,
    TextFile { path: String },
    InfoPacks { path: String },
    LooseObject { path: String },
    PackFile { path: String },
    IdxFile { path: String },
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::PackRpc { .. } => ResourceKind::PackRpc,
            Resource::InfoRefs => ResourceKind::InfoRefs,
            Resource::TextFile { .. } => ResourceKind::TextFile,
            Resource::InfoPacks { .. } => ResourceKind::InfoPacks,
            Resource::LooseObject { .. } => ResourceKind::LooseObject,
            Resource::PackFile { .. } => ResourceKind::PackFile,
            Resource::IdxFile { .. } => ResourceKind::IdxFile,
        }
    }
}

/// One immutable entry of the route table.
#[derive(Debug)]
pub struct RouteRule {
    pattern: Regex,
    pub verb: Method,
    pub kind: ResourceKind,
    pub direction: Direction,
}

impl RouteRule {
    fn new(pattern: &str, verb: Method, kind: ResourceKind, direction: Direction) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("route patterns are valid"),
            verb,
            kind,
            direction,
        }
    }

    fn resource(&self, captures: &Captures<'_>) -> Resource {
        let capture = |name: &str| {
            captures
                .name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        match self.kind {
            ResourceKind::PackRpc => Resource::PackRpc {
                pack_type: capture("pack_type"),
            },
            ResourceKind::InfoRefs => Resource::InfoRefs,
            ResourceKind::TextFile => Resource::TextFile {
                path: capture("path"),
            },
            ResourceKind::InfoPacks => Resource::InfoPacks {
                path: capture("path"),
            },
            ResourceKind::LooseObject => Resource::LooseObject {
                path: capture("path"),
            },
            ResourceKind::PackFile => Resource::PackFile {
                path: capture("path"),
            },
            ResourceKind::IdxFile => Resource::IdxFile {
                path: capture("path"),
            },
        }
    }
}

/// The route table, in evaluation order.
pub static ROUTES: LazyLock<Vec<RouteRule>> = LazyLock::new(|| {
    use Direction::*;
    use ResourceKind::*;

    vec![
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<pack_type>git-upload-pack)$",
            Method::POST,
            PackRpc,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<pack_type>git-receive-pack)$",
            Method::POST,
            PackRpc,
            Push,
        ),
        RouteRule::new(r"^/(?P<repo>.*?)/info/refs$", Method::GET, InfoRefs, Unknown),
        RouteRule::new(r"^/(?P<repo>.*?)/(?P<path>HEAD)$", Method::GET, TextFile, Pull),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/info/alternates)$",
            Method::GET,
            TextFile,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/info/http-alternates)$",
            Method::GET,
            TextFile,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/info/packs)$",
            Method::GET,
            InfoPacks,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/info/[^/]+)$",
            Method::GET,
            TextFile,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/[0-9a-f]{2}/[0-9a-f]{38})$",
            Method::GET,
            LooseObject,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/pack/pack-[0-9a-f]{40}\.pack)$",
            Method::GET,
            PackFile,
            Pull,
        ),
        RouteRule::new(
            r"^/(?P<repo>.*?)/(?P<path>objects/pack/pack-[0-9a-f]{40}\.idx)$",
            Method::GET,
            IdxFile,
            Pull,
        ),
    ]
});

/// Result of matching a sanitized path against [`ROUTES`].
#[derive(Debug)]
pub struct RouteMatch {
    pub rule: &'static RouteRule,
    pub repository: String,
    pub resource: Resource,
}

/// Return the first rule whose pattern matches `path`. Later rules are never consulted.
pub fn match_route(path: &str) -> Option<RouteMatch> {
    ROUTES.iter().find_map(|rule| {
        let captures = rule.pattern.captures(path)?;
        Some(RouteMatch {
            rule,
            repository: captures
                .name("repo")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            resource: rule.resource(&captures),
        })
    })
}

/// Match `path` and apply the request-only gates, in this order:
/// no rule → not found; wrong verb → method not allowed (or bad request before HTTP/1.1);
/// a `.`/`..` segment in the repository name → bad request.
///
/// Repository existence is checked later, once an adapter is bound to the resolved path.
pub fn route(path: &str, method: &Method, version: Version) -> Result<RouteMatch, HttpError> {
    let matched = match_route(path).ok_or(HttpError::NotFound)?;
    if matched.rule.verb != *method {
        tracing::debug!(%path, %method, expected = %matched.rule.verb, "verb mismatch");
        return Err(HttpError::method_not_allowed(version));
    }
    if has_traversal_segment(&matched.repository) {
        tracing::debug!(%path, repository = %matched.repository, "rejected traversal segment");
        return Err(HttpError::BadRequest);
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "31d73eb4914a8ddb6cb0e4adf250777161118f90";

    fn kind_of(path: &str) -> Option<ResourceKind> {
        match_route(path).map(|m| m.resource.kind())
    }

    #[test]
    fn test_rpc_endpoints_capture_pack_type() {
        let m = match_route("/group/repo.git/git-upload-pack").unwrap();
        assert_eq!(m.repository, "group/repo.git");
        assert_eq!(
            m.resource,
            Resource::PackRpc {
                pack_type: "git-upload-pack".to_string()
            }
        );
        assert_eq!(m.rule.direction, Direction::Pull);
        assert_eq!(m.rule.verb, Method::POST);

        let m = match_route("/repo.git/git-receive-pack").unwrap();
        assert_eq!(m.rule.direction, Direction::Push);
    }

    #[test]
    fn test_info_refs_direction_is_unknown() {
        let m = match_route("/repo.git/info/refs").unwrap();
        assert_eq!(m.resource, Resource::InfoRefs);
        assert_eq!(m.rule.direction, Direction::Unknown);
    }

    #[test]
    fn test_specific_objects_info_rules_win_over_catch_all() {
        assert_eq!(
            kind_of("/repo.git/objects/info/packs"),
            Some(ResourceKind::InfoPacks)
        );
        let m = match_route("/repo.git/objects/info/alternates").unwrap();
        assert_eq!(
            m.resource,
            Resource::TextFile {
                path: "objects/info/alternates".to_string()
            }
        );
        // Same kind as the catch-all, but the specific rule is the one selected.
        assert!(std::ptr::eq(m.rule, &ROUTES[4]));
        let m = match_route("/repo.git/objects/info/commit-graph").unwrap();
        assert!(std::ptr::eq(m.rule, &ROUTES[7]));
    }

    #[test]
    fn test_object_and_pack_paths() {
        let loose = format!("/repo.git/objects/{}/{}", &OID[..2], &OID[2..]);
        assert_eq!(
            match_route(&loose).unwrap().resource,
            Resource::LooseObject {
                path: format!("objects/{}/{}", &OID[..2], &OID[2..])
            }
        );
        assert_eq!(
            kind_of(&format!("/repo.git/objects/pack/pack-{OID}.pack")),
            Some(ResourceKind::PackFile)
        );
        assert_eq!(
            kind_of(&format!("/repo.git/objects/pack/pack-{OID}.idx")),
            Some(ResourceKind::IdxFile)
        );
        assert_eq!(kind_of("/repo.git/objects/ab/short"), None);
        assert_eq!(kind_of(&format!("/repo.git/objects/pack/pack-{OID}.rev")), None);
    }

    #[test]
    fn test_unmatched_paths() {
        assert_eq!(kind_of("/HEAD"), None);
        assert_eq!(kind_of("/repo.git/description"), None);
        assert_eq!(kind_of("/repo.git/git-upload-archive"), None);
    }

    #[test]
    fn test_gate_order() {
        // Verb mismatch beats a malformed repository name.
        assert_eq!(
            route("/../repo.git/HEAD", &Method::POST, Version::HTTP_11).unwrap_err(),
            HttpError::MethodNotAllowed
        );
        assert_eq!(
            route("/../repo.git/HEAD", &Method::POST, Version::HTTP_10).unwrap_err(),
            HttpError::BadRequest
        );
        assert_eq!(
            route("/../repo.git/HEAD", &Method::GET, Version::HTTP_11).unwrap_err(),
            HttpError::BadRequest
        );
        assert_eq!(
            route("/nothing/here", &Method::GET, Version::HTTP_11).unwrap_err(),
            HttpError::NotFound
        );
        assert!(route("/repo.git/HEAD", &Method::GET, Version::HTTP_11).is_ok());
    }

    #[test]
    fn test_traversal_rejected_for_every_resource_kind() {
        let paths = [
            ("/a/./git-upload-pack", Method::POST),
            ("/../git-receive-pack", Method::POST),
            ("/a/../info/refs", Method::GET),
            ("/./HEAD", Method::GET),
            ("/../objects/info/packs", Method::GET),
        ];
        for (path, method) in paths {
            assert_eq!(
                route(path, &method, Version::HTTP_11).unwrap_err(),
                HttpError::BadRequest,
                "{path}"
            );
        }
    }
}
