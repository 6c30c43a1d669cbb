//! Two-tier caching: shared remote tier and bounded local tier.

pub mod local;
pub mod remote;
pub mod tiered;
pub mod types;


pub use local::{LocalCache, LocalCacheHandle};
#[cfg(any(test, feature = "mock"))]
pub use remote::MockRemoteStore;
pub use remote::{RedisStore, RemoteStore, RemoteStoreError};
pub use tiered::{ClearReport, TieredCache, TieredLookupResult};
pub use types::{
    CacheTier, CachedResponse, RELAY_STATUS_ERROR, RELAY_STATUS_HEADER, RelayStatus,
};
