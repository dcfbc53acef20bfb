//! A concurrent HTTP/1.0 forward proxy: one Tokio task per connection,
//! GET-only request forwarding, and a single shared in-memory cache with a
//! bounded total footprint and an approximate-LRU eviction policy.
//!
//! The interesting engineering is in two places: [`cache`], the
//! concurrency-safe store and its readers-writer gate, and [`pipeline`],
//! the per-connection state machine that drives it.

pub mod cache;
pub mod error;
pub mod headers;
pub mod memory;
pub mod pipeline;
pub mod uri;

pub use cache::{ProxyCache, MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
pub use error::ProxyError;
pub use pipeline::handle_connection;
pub use uri::{parse_uri, OriginTarget, LINE_BUDGET};
