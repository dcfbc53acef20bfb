//! URI Parser: splits an absolute (or scheme-less) request-line URI into the
//! origin `host`, `port`, and `path`, and prebuilds the origin-side request
//! prelude. Pure function, no I/O, no scheme validation, no percent-decoding.

use crate::error::ProxyError;

/// Per-line buffer budget shared with the request line reader (§6 of the
/// design doc: "8 KiB" reference figure).
pub const LINE_BUDGET: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginTarget {
    pub host: String,
    pub port: String,
    pub path: String,
}

impl OriginTarget {
    /// `"GET <path> HTTP/1.0\r\nHost: <host>\r\n"` — the fixed prelude sent
    /// to the origin ahead of the rewritten headers.
    pub fn request_prelude(&self) -> String {
        format!("GET {} HTTP/1.0\r\nHost: {}\r\n", self.path, self.host)
    }
}

/// Parses the request-line URI per §4.1: locate `"//"`, then scan for the
/// first of `'/'`, `':'`, or end-of-string to delimit `host`; a `':'`
/// terminator introduces a numeric `port` up to the next `'/'` or end; the
/// remainder (or default `"/"`) is `path`. Components that would overrun
/// `LINE_BUDGET` fail closed rather than being silently truncated.
pub fn parse_uri(uri: &str) -> Result<OriginTarget, ProxyError> {
    if uri.len() > LINE_BUDGET {
        return Err(ProxyError::MalformedRequest("uri exceeds line budget"));
    }

    let rest = match uri.find("//") {
        Some(idx) => &uri[idx + 2..],
        None => uri,
    };

    let host_end = rest
        .find(|c| c == '/' || c == ':')
        .unwrap_or(rest.len());
    let host = &rest[..host_end];
    if host.is_empty() {
        return Err(ProxyError::MalformedRequest("empty host in uri"));
    }
    if host.len() > LINE_BUDGET {
        return Err(ProxyError::MalformedRequest("host exceeds line budget"));
    }

    let tail = &rest[host_end..];
    let (port, path) = if let Some(stripped) = tail.strip_prefix(':') {
        let port_end = stripped.find('/').unwrap_or(stripped.len());
        let port = &stripped[..port_end];
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProxyError::MalformedRequest("invalid port in uri"));
        }
        let path = &stripped[port_end..];
        (port.to_string(), if path.is_empty() { "/".to_string() } else { path.to_string() })
    } else if tail.starts_with('/') {
        ("80".to_string(), tail.to_string())
    } else {
        ("80".to_string(), "/".to_string())
    };

    if path.len() > LINE_BUDGET {
        return Err(ProxyError::MalformedRequest("path exceeds line budget"));
    }

    Ok(OriginTarget {
        host: host.to_string(),
        port,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_with_path() {
        let t = parse_uri("http://127.0.0.1:18080/x").unwrap();
        assert_eq!(t.host, "127.0.0.1");
        assert_eq!(t.port, "18080");
        assert_eq!(t.path, "/x");
    }

    #[test]
    fn default_port_and_path() {
        let t = parse_uri("http://example.com").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, "80");
        assert_eq!(t.path, "/");
    }

    #[test]
    fn no_scheme_is_tolerated() {
        let t = parse_uri("example.com/a/b").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, "80");
        assert_eq!(t.path, "/a/b");
    }

    #[test]
    fn host_and_path_no_port() {
        let t = parse_uri("http://example.com/a").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, "80");
        assert_eq!(t.path, "/a");
    }

    #[test]
    fn request_prelude_format() {
        let t = parse_uri("http://h:8080/a").unwrap();
        assert_eq!(t.request_prelude(), "GET /a HTTP/1.0\r\nHost: h\r\n");
    }

    #[test]
    fn empty_host_is_malformed() {
        assert!(parse_uri("http:///a").is_err());
    }

    #[test]
    fn non_numeric_port_is_malformed() {
        assert!(parse_uri("http://h:abc/a").is_err());
    }

    #[test]
    fn oversized_uri_is_malformed() {
        let huge = format!("http://h/{}", "a".repeat(LINE_BUDGET));
        assert!(parse_uri(&huge).is_err());
    }
}
