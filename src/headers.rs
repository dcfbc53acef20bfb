//! Header Rewriter: emits the fixed proxy headers ahead of the client's
//! remaining request headers, suppressing the ones the proxy itself
//! supersedes. GET-only, so no body is ever relayed.

const FIXED_HEADERS: &[&str] = &[
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3\r\n",
    "Connection: close\r\n",
    "Proxy-Connection: close\r\n",
];

const SUPPRESSED_PREFIXES: &[&str] = &["Host:", "User-Agent:", "Connection:", "Proxy-Connection:"];

/// Builds the origin-bound header block: the three fixed headers, then each
/// client header verbatim except the ones whose case-sensitive prefix
/// matches `SUPPRESSED_PREFIXES`, then a final blank line.
///
/// `client_headers` entries are `"Name: value"` lines without a trailing
/// CRLF (the form `parse_request_line` produces); this function adds it.
pub fn rewrite_headers(client_headers: &[String]) -> String {
    let mut out = String::new();
    for fixed in FIXED_HEADERS {
        out.push_str(fixed);
    }
    for header in client_headers {
        if SUPPRESSED_PREFIXES
            .iter()
            .any(|prefix| header.starts_with(prefix))
        {
            continue;
        }
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_fixed_headers_first() {
        let out = rewrite_headers(&[]);
        assert!(out.starts_with("User-Agent: Mozilla/5.0"));
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert!(lines[1].starts_with("Connection: close"));
        assert!(lines[2].starts_with("Proxy-Connection: close"));
    }

    #[test]
    fn suppresses_client_overrides() {
        let client = vec![
            "Host: evil.example".to_string(),
            "User-Agent: curl/8".to_string(),
            "Connection: keep-alive".to_string(),
            "Proxy-Connection: keep-alive".to_string(),
            "Accept: */*".to_string(),
        ];
        let out = rewrite_headers(&client);
        assert_eq!(out.matches("Host:").count(), 0);
        assert_eq!(out.matches("User-Agent:").count(), 1);
        assert_eq!(out.matches("Connection:").count(), 1);
        assert_eq!(out.matches("Proxy-Connection:").count(), 1);
        assert!(out.contains("Accept: */*\r\n"));
    }

    #[test]
    fn terminates_with_blank_line() {
        let out = rewrite_headers(&["Accept: */*".to_string()]);
        assert!(out.ends_with("\r\n\r\n"));
    }
}
