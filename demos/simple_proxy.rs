//! Minimal usage example: bind a listener and hand each connection to the
//! library's pipeline directly, with no CLI argument parsing or signal
//! handling layered on top (contrast `src/main.rs`, which adds both).
//!
//! Run with: cargo run --example simple_proxy
//! Then test with: curl -x localhost:3128 http://example.com

use squidcache::{handle_connection, ProxyCache};
use tokio::net::TcpListener;

const PROXY_PORT: u16 = 3128;

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_env_filter("squidcache=info").init();

    let cache = ProxyCache::new();
    let listener = TcpListener::bind(("127.0.0.1", PROXY_PORT)).await?;
    println!("listening on localhost:{PROXY_PORT}");

    loop {
        let (client, _addr) = listener.accept().await?;
        let cache = cache.clone();
        tokio::spawn(async move {
            handle_connection(client, cache).await;
        });
    }
}
