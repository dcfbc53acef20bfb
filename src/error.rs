//! Error taxonomy (§7) and the Error Responder (§4.6).
//!
//! `ProxyError` is a kind, not a wrapped-exception type: every variant maps
//! to exactly one client-visible status and is recovered at the pipeline
//! boundary — nothing here is ever propagated across connections.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("could not connect to origin: {0}")]
    UpstreamConnectFailure(String),

    #[error("origin I/O failure: {0}")]
    UpstreamIoFailure(#[from] std::io::Error),

    #[error("client write failure")]
    ClientWriteFailure,

    /// Object too large, or the store declined the insert. Never surfaced
    /// to the client; logged at `debug!` where it occurs (see `cache.rs`).
    #[error("admission skipped: {0}")]
    AdmissionSkipped(&'static str),

    /// Out of memory or file descriptors. Logged at `warn!`; the connection
    /// is abandoned but the process continues serving others.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(&'static str),
}

impl ProxyError {
    /// Status code for the kinds that produce a client-visible error page.
    /// `AdmissionSkipped` and `ResourceExhaustion` are logged, not rendered,
    /// and have no meaningful status; callers must not invoke this for them.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::MalformedRequest(_) => 400,
            ProxyError::UnsupportedMethod(_) => 501,
            ProxyError::UpstreamConnectFailure(_) => 502,
            ProxyError::UpstreamIoFailure(_) => 502,
            ProxyError::ClientWriteFailure => 502,
            ProxyError::AdmissionSkipped(_) | ProxyError::ResourceExhaustion(_) => {
                unreachable!("{self} is logged, not rendered to the client")
            }
        }
    }

    fn reason_phrase(&self) -> &'static str {
        match self.status_code() {
            400 => "Bad Request",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            _ => "Error",
        }
    }

    fn long_message(&self) -> String {
        match self {
            ProxyError::MalformedRequest(detail) => {
                format!("The request could not be parsed: {detail}.")
            }
            ProxyError::UnsupportedMethod(method) => {
                format!("The method \"{method}\" is not supported; only GET is honored.")
            }
            ProxyError::UpstreamConnectFailure(detail) => {
                format!("Could not establish a connection to the origin server: {detail}.")
            }
            ProxyError::UpstreamIoFailure(err) => {
                format!("The connection to the origin server failed: {err}.")
            }
            ProxyError::ClientWriteFailure => {
                "The connection to the client was lost mid-response.".to_string()
            }
            ProxyError::AdmissionSkipped(_) | ProxyError::ResourceExhaustion(_) => {
                unreachable!("{self} is logged, not rendered to the client")
            }
        }
    }
}

/// Renders the minimal HTML error page: status line, a `Content-type` header,
/// and a small fixed-shape body naming the status, the short and long
/// messages, the cause, and a footer identifying the proxy.
pub fn render_page(err: &ProxyError) -> String {
    let status = err.status_code();
    let reason = err.reason_phrase();
    let body = format!(
        "<html><head><title>{status} {reason}</title></head>\
<body><h1>{status} {reason}</h1><p>{}</p><p><em>{err}</em></p>\
<hr><address>squidcache proxy</address></body></html>",
        err.long_message()
    );
    format!(
        "HTTP/1.0 {status} {reason}\r\n\
Content-type: text/html\r\n\
Content-Length: {}\r\n\
\r\n\
{body}",
        body.len()
    )
}
