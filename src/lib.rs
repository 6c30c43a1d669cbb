//! Relay: a caching reverse proxy core.
//!
//! Requests name an upstream URL; responses are served from a two-tier cache
//! (shared Redis tier, bounded in-process LRU tier), with concurrent misses
//! for the same URL coalesced onto a single resilient upstream fetch.

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod gateway;
pub mod hashing;
pub mod metrics;
pub mod proxy;
pub mod upstream;

pub use cache::{
    CacheTier, CachedResponse, LocalCacheHandle, RELAY_STATUS_HEADER, RedisStore, RelayStatus,
    RemoteStore, TieredCache,
};
pub use coalesce::RequestCoalescer;
pub use config::Config;
pub use gateway::{HandlerState, create_router_with_state};
pub use metrics::{Metrics, MetricsSnapshot};
pub use proxy::{ProxyCore, ProxyError, ProxyResponse};
pub use upstream::{FetchError, HttpOrigin, Payload, ResilientFetcher};
