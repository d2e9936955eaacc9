//! Helper functions shared by the HTTP handlers: request path cleanup, pkt-line encoding for the
//! advertisement preamble, and HTTP date formatting.

use std::sync::LazyLock;
use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use regex::Regex;

use super::types::{PKT_LINE_END_MARKER, ServiceType};

static SLASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new("/+").expect("valid regex"));

/// Percent-decode `path` and collapse runs of `/` into one.
///
/// Only `%XX` escapes are decoded; `+` is kept as a literal plus rather than read as a space, so
/// repository names such as `c++.git` route as written. Returns `None` when the decoded bytes
/// are not valid UTF-8.
pub fn sanitize_path(path: &str) -> Option<String> {
    let decoded = urlencoding::decode(path).ok()?;
    Some(SLASH_RUNS.replace_all(&decoded, "/").into_owned())
}

/// Whether any `/`-separated segment of `path` is `.` or `..`.
pub fn has_traversal_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

/// Add a packet line string to the buffer with proper length prefix
pub fn add_pkt_line_string(pkt_line_stream: &mut BytesMut, buf_str: &str) {
    let buf_str_length = buf_str.len() + 4;
    pkt_line_stream.put(Bytes::from(format!("{buf_str_length:04x}")));
    pkt_line_stream.put(buf_str.as_bytes());
}

/// `# service=<name>\n` pkt-line followed by a flush packet; smart clients expect it ahead of the
/// ref advertisement over HTTP.
pub fn service_advertisement(service: ServiceType) -> Bytes {
    let mut pkt_line_stream = BytesMut::new();
    add_pkt_line_string(&mut pkt_line_stream, &format!("# service={service}\n"));
    pkt_line_stream.put(&PKT_LINE_END_MARKER[..]);
    pkt_line_stream.freeze()
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sanitize_collapses_and_decodes() {
        assert_eq!(
            sanitize_path("//repo.git///info//refs").as_deref(),
            Some("/repo.git/info/refs")
        );
        assert_eq!(
            sanitize_path("/my%20repo.git/HEAD").as_deref(),
            Some("/my repo.git/HEAD")
        );
        assert_eq!(
            sanitize_path("/%2e%2e/HEAD").as_deref(),
            Some("/../HEAD")
        );
        assert_eq!(sanitize_path("/%ff%fe/HEAD"), None);
    }

    #[test]
    fn test_sanitize_keeps_literal_plus() {
        assert_eq!(
            sanitize_path("/c++.git/HEAD").as_deref(),
            Some("/c++.git/HEAD")
        );
        assert_eq!(
            sanitize_path("/c%2B%2B.git/HEAD").as_deref(),
            Some("/c++.git/HEAD")
        );
    }

    #[test]
    fn test_traversal_segments() {
        assert!(has_traversal_segment(".."));
        assert!(has_traversal_segment("group/../repo.git"));
        assert!(has_traversal_segment("./repo.git"));
        assert!(!has_traversal_segment("repo.git"));
        assert!(!has_traversal_segment("group/..repo.git"));
        assert!(!has_traversal_segment("group/repo..git"));
    }

    #[test]
    fn test_service_advertisement_preamble() {
        assert_eq!(
            &service_advertisement(ServiceType::ReceivePack)[..],
            b"001f# service=git-receive-pack\n0000"
        );
    }

    #[test]
    fn test_http_date_format() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }
}
