//! Request Pipeline: the per-connection state machine, S0 through S_done
//! (§4.5). One Tokio task runs this to completion per accepted connection;
//! nothing here is shared across connections except the `ProxyCache` handle.

use crate::cache::{ProxyCache, MAX_OBJECT_SIZE};
use crate::error::{render_page, ProxyError};
use crate::headers::rewrite_headers;
use crate::memory::has_sufficient_memory;
use crate::uri::{parse_uri, LINE_BUDGET};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Generous ceiling on the whole request head (request line + headers)
/// before it is treated as malformed; a handful of multiples of the
/// per-line budget covers any request a browser or curl would send.
const MAX_REQUEST_HEAD: usize = LINE_BUDGET * 8;

/// The spec leaves timeouts unspecified and permits adding them without
/// changing the contract (§6); a wedged origin otherwise pins a task and
/// its connection forever.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(30);

struct ParsedRequest {
    method: String,
    uri: String,
    headers: Vec<String>,
}

/// Runs the full state machine for one accepted client connection. Every
/// exit path closes `client` (by drop) and releases its buffers; failures
/// are recovered here and never propagate past this function.
pub async fn handle_connection(mut client: TcpStream, cache: ProxyCache) {
    // S0: read the request head.
    let raw = match read_request_head(&mut client).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return, // empty read: silently close
        Err(err) => {
            respond_error(&mut client, &err).await;
            return;
        }
    };

    let parsed = match parse_request(&raw) {
        Some(p) => p,
        None => {
            respond_error(&mut client, &ProxyError::MalformedRequest("unparsable request line"))
                .await;
            return;
        }
    };

    // S1: validate method.
    if parsed.method != "GET" {
        warn!(method = %parsed.method, "unsupported method");
        respond_error(&mut client, &ProxyError::UnsupportedMethod(parsed.method)).await;
        return;
    }

    // S2: cache probe.
    if let Some(body) = cache.lookup(&parsed.uri).await {
        info!(uri = %parsed.uri, "cache hit");
        let _ = client.write_all(&body).await;
        return;
    }
    debug!(uri = %parsed.uri, "cache miss");

    // S3: parse the origin URI.
    let target = match parse_uri(&parsed.uri) {
        Ok(t) => t,
        Err(err) => {
            respond_error(&mut client, &err).await;
            return;
        }
    };

    // S4: connect upstream.
    let addr = format!("{}:{}", target.host, target.port);
    let mut upstream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            let err = ProxyError::UpstreamConnectFailure(format!("{addr}: {e}"));
            respond_error(&mut client, &err).await;
            return;
        }
        Err(_) => {
            let err = ProxyError::UpstreamConnectFailure(format!("{addr}: connect timed out"));
            respond_error(&mut client, &err).await;
            return;
        }
    };

    // S5: send the rewritten request to the origin.
    let mut origin_request = target.request_prelude();
    origin_request.push_str(&rewrite_headers(&parsed.headers));
    if let Err(e) = upstream.write_all(origin_request.as_bytes()).await {
        warn!(error = %e, "failed to forward request to origin");
        respond_error(&mut client, &ProxyError::UpstreamIoFailure(e)).await;
        return;
    }

    // S6: stream the response back to the client, staging a copy for the
    // cache as we go. A client write failure abandons further client
    // writes but keeps draining the origin so admission can still proceed.
    let mut staging = BytesMut::with_capacity(MAX_OBJECT_SIZE);
    let mut total_size: usize = 0;
    let mut client_write_failed = false;
    let mut origin_io_failed = false;
    let mut chunk = [0u8; 8192];

    loop {
        let n = match timeout(IO_TIMEOUT, upstream.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!(error = %e, "origin read failed mid-stream");
                origin_io_failed = true;
                break;
            }
            Err(_) => {
                debug!("origin read timed out mid-stream");
                origin_io_failed = true;
                break;
            }
        };

        if total_size + n <= MAX_OBJECT_SIZE {
            staging.extend_from_slice(&chunk[..n]);
        }
        total_size += n;

        if !client_write_failed {
            if let Err(io_err) = client.write_all(&chunk[..n]).await {
                let kind = ProxyError::ClientWriteFailure;
                debug!(error = %io_err, %kind, "draining origin only");
                client_write_failed = true;
            }
        }
    }

    // S7: admit to cache if eligible. A mid-stream origin I/O failure means
    // the client already received a partial, possibly-truncated body; never
    // cache it even if it happened to land under the size budget.
    if origin_io_failed {
        let kind = ProxyError::AdmissionSkipped("origin I/O failure mid-stream");
        debug!(uri = %parsed.uri, %kind);
    } else if total_size <= MAX_OBJECT_SIZE {
        if has_sufficient_memory() {
            cache.admit(&parsed.uri, staging.freeze()).await;
            info!(uri = %parsed.uri, size = total_size, "admitted to cache");
        } else {
            let kind = ProxyError::ResourceExhaustion("insufficient system memory for admission");
            warn!(uri = %parsed.uri, %kind, "connection's cache admission abandoned; proxy continues serving other connections");
        }
    } else {
        let kind = ProxyError::AdmissionSkipped("object exceeds MAX_OBJECT_SIZE");
        debug!(uri = %parsed.uri, size = total_size, %kind);
    }
}

/// Reads into `client` until a blank line terminates the header block.
/// Returns `Ok(None)` on an immediate EOF (S0's "empty read ⇒ silently
/// close"), `Err` if the head exceeds the request-head budget.
async fn read_request_head(client: &mut TcpStream) -> Result<Option<BytesMut>, ProxyError> {
    let mut buffer = BytesMut::with_capacity(LINE_BUDGET);
    loop {
        let n = match timeout(IO_TIMEOUT, client.read_buf(&mut buffer)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                // A failed read from the client itself, not the origin; no
                // origin has even been contacted yet, so S0's "empty read
                // ⇒ silently close" applies rather than a 502.
                debug!(error = %e, "client read failed before headers completed");
                return Ok(None);
            }
            Err(_) => {
                return Err(ProxyError::MalformedRequest("client idle past the read timeout"))
            }
        };
        if n == 0 {
            return if buffer.is_empty() {
                Ok(None)
            } else {
                Err(ProxyError::MalformedRequest("connection closed before headers completed"))
            };
        }
        if buffer.len() > MAX_REQUEST_HEAD {
            return Err(ProxyError::MalformedRequest("request head exceeds line budget"));
        }
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(Some(buffer));
        }
    }
}

/// Splits the request line from the header block and tokenizes it: fewer
/// than three whitespace-separated tokens is a parse failure (S0).
fn parse_request(data: &[u8]) -> Option<ParsedRequest> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(data) {
        Ok(httparse::Status::Complete(_)) => {
            let method = req.method?.to_string();
            let uri = req.path?.to_string();
            req.version?;
            let headers = req
                .headers
                .iter()
                .map(|h| format!("{}: {}", h.name, String::from_utf8_lossy(h.value)))
                .collect();
            Some(ParsedRequest { method, uri, headers })
        }
        _ => None,
    }
}

async fn respond_error(client: &mut TcpStream, err: &ProxyError) {
    let page = render_page(err);
    let _ = client.write_all(page.as_bytes()).await;
}
