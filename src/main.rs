//! Connection Dispatcher and CLI entry point. These are treated as external
//! collaborators by the design doc (a conventional accept/dispatch surface),
//! so the logic here stays close to the teacher crate's original shape:
//! one positional port argument, one Tokio task per accepted connection.

use squidcache::{handle_connection, ProxyCache, ProxyError, MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("squidcache=info".parse()?),
        )
        .init();

    let port = match parse_port_arg(std::env::args().collect()) {
        Some(port) => port,
        None => {
            eprintln!("usage: squidcache <port>");
            std::process::exit(1);
        }
    };

    info!("squidcache forward proxy");
    info!("listening on port {port}");
    info!("max object size: {MAX_OBJECT_SIZE} bytes");
    info!("max cache size: {MAX_CACHE_SIZE} bytes");

    // SIGPIPE handling (§6): a client disconnecting mid-write would
    // otherwise raise SIGPIPE; drain it in the background so it never
    // reaches default disposition. Rust's runtime already ignores SIGPIPE
    // by default, but an explicit listener makes the "caught and logged"
    // contract visible and keeps the no-op handler installed exactly once.
    let mut sigpipe = signal(SignalKind::pipe())?;
    tokio::spawn(async move {
        loop {
            sigpipe.recv().await;
            debug!("SIGPIPE received and ignored");
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let cache = ProxyCache::new();
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((client, addr)) => {
                        debug!(%addr, "accepted connection");
                        let cache = cache.clone();
                        tokio::spawn(async move {
                            handle_connection(client, cache).await;
                        });
                    }
                    Err(e) if is_resource_exhaustion(&e) => {
                        let kind = ProxyError::ResourceExhaustion("out of file descriptors");
                        warn!(error = %e, %kind, "dropping this connection attempt; proxy continues serving others");
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Parses the single positional port argument. Usage errors (wrong arity,
/// non-numeric port) are reported by returning `None`; the caller prints
/// the usage line and exits non-zero.
fn parse_port_arg(args: Vec<String>) -> Option<u16> {
    if args.len() != 2 {
        return None;
    }
    args[1].parse::<u16>().ok()
}

/// Distinguishes file-descriptor exhaustion (`EMFILE`/`ENFILE`) from other
/// accept failures, so only the former is reported as `ResourceExhaustion`
/// per §7 rather than a generic accept error. Matches the `memory` module's
/// existing `#[cfg(target_os = "linux")]` fallback style.
fn is_resource_exhaustion(e: &std::io::Error) -> bool {
    #[cfg(target_os = "linux")]
    {
        const EMFILE: i32 = 24;
        const ENFILE: i32 = 23;
        matches!(e.raw_os_error(), Some(EMFILE) | Some(ENFILE))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = e;
        false
    }
}
