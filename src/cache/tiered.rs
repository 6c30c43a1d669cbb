//! Tiered cache: shared remote tier + bounded local tier.
//!
//! Read order is fixed: remote first, local second. The remote tier is an
//! optimization, never a correctness dependency — any remote failure,
//! undecodable entry, or expired entry is absorbed as a miss. Writes go to
//! both tiers independently, each with its own TTL policy; a failed remote
//! write is logged and never fails the request.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::local::LocalCacheHandle;
use super::remote::{RemoteStore, RemoteStoreError};
use super::types::{CacheTier, CachedResponse, RelayStatus};
use crate::upstream::Payload;

/// Result of a tiered read.
#[derive(Debug, Clone, PartialEq)]
pub enum TieredLookupResult {
    HitRemote(CachedResponse),
    HitLocal(CachedResponse),
    Miss,
}

impl TieredLookupResult {
    #[inline]
    pub fn is_hit(&self) -> bool {
        !matches!(self, TieredLookupResult::Miss)
    }

    /// The tier that served the hit, if any.
    #[inline]
    pub fn tier(&self) -> Option<CacheTier> {
        match self {
            TieredLookupResult::HitRemote(_) => Some(CacheTier::Remote),
            TieredLookupResult::HitLocal(_) => Some(CacheTier::Local),
            TieredLookupResult::Miss => None,
        }
    }

    /// The relay status a hit would be reported as.
    #[inline]
    pub fn status(&self) -> Option<RelayStatus> {
        match self {
            TieredLookupResult::HitRemote(_) => Some(RelayStatus::HitRemote),
            TieredLookupResult::HitLocal(_) => Some(RelayStatus::HitLocal),
            TieredLookupResult::Miss => None,
        }
    }

    pub fn into_entry(self) -> Option<CachedResponse> {
        match self {
            TieredLookupResult::HitRemote(entry) | TieredLookupResult::HitLocal(entry) => {
                Some(entry)
            }
            TieredLookupResult::Miss => None,
        }
    }
}

/// Outcome of an invalidation. Clearing the local tier cannot fail; the
/// remote side is best-effort, and a failed remote clear is a partial
/// success, not a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub local_cleared: bool,
    pub remote_cleared: bool,
}

impl ClearReport {
    #[inline]
    pub fn is_partial(&self) -> bool {
        self.local_cleared != self.remote_cleared
    }
}

/// Read/populate/invalidate across both cache tiers.
pub struct TieredCache<R: RemoteStore> {
    remote: R,
    local: LocalCacheHandle,
    remote_ttl: Duration,
    local_ttl: Duration,
}

impl<R: RemoteStore> std::fmt::Debug for TieredCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("local", &self.local)
            .field("remote_ttl", &self.remote_ttl)
            .field("local_ttl", &self.local_ttl)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteStore> TieredCache<R> {
    pub fn new(remote: R, local: LocalCacheHandle, remote_ttl: Duration, local_ttl: Duration) -> Self {
        Self {
            remote,
            local,
            remote_ttl,
            local_ttl,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local(&self) -> &LocalCacheHandle {
        &self.local
    }

    /// Reads `key` from the remote tier, then the local tier.
    #[instrument(skip(self, key), fields(key = key))]
    pub async fn lookup(&self, key: &str) -> TieredLookupResult {
        match self.remote.get(key).await {
            Ok(Some(bytes)) => match CachedResponse::from_bytes(&bytes) {
                Ok(entry) if !entry.is_expired() => {
                    debug!("remote tier hit");
                    return TieredLookupResult::HitRemote(entry);
                }
                Ok(_) => debug!("remote entry expired, treating as miss"),
                Err(e) => warn!(error = %e, "undecodable remote entry, treating as miss"),
            },
            Ok(None) => debug!("remote tier miss"),
            Err(RemoteStoreError::Disabled) => debug!("remote tier disabled"),
            Err(e) => warn!(error = %e, "remote tier unavailable, treating as miss"),
        }

        match self.local.lookup(key) {
            Some(entry) => {
                debug!("local tier hit");
                TieredLookupResult::HitLocal(entry)
            }
            None => {
                debug!("both tiers missed");
                TieredLookupResult::Miss
            }
        }
    }

    /// Writes the fetched representation into both tiers, each under its own
    /// TTL. Remote failures are logged and swallowed.
    #[instrument(skip(self, key, payload), fields(key = key))]
    pub async fn populate(&self, key: &str, payload: &Payload, upstream_status: u16) {
        let remote_entry = CachedResponse::new(payload.clone(), upstream_status, self.remote_ttl);
        match remote_entry.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.remote.set(key, bytes, self.remote_ttl).await {
                    if !matches!(e, RemoteStoreError::Disabled) {
                        warn!(error = %e, "remote tier write failed, keeping local copy only");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to encode entry for remote tier"),
        }

        let local_entry = CachedResponse::new(payload.clone(), upstream_status, self.local_ttl);
        self.local.insert(key, local_entry);
    }

    /// Removes one key from both tiers; the remote side is best-effort.
    #[instrument(skip(self, key), fields(key = key))]
    pub async fn invalidate(&self, key: &str) -> ClearReport {
        let remote_cleared = match self.remote.delete(key).await {
            Ok(()) | Err(RemoteStoreError::Disabled) => true,
            Err(e) => {
                warn!(error = %e, "remote tier delete failed");
                false
            }
        };

        self.local.remove(key);

        ClearReport {
            local_cleared: true,
            remote_cleared,
        }
    }

    /// Clears the local tier entirely and bulk-clears the remote tier. A
    /// failed remote clear yields a partial-success report.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> ClearReport {
        self.local.clear();

        let remote_cleared = match self.remote.clear_all().await {
            Ok(()) | Err(RemoteStoreError::Disabled) => true,
            Err(e) => {
                warn!(error = %e, "remote tier bulk clear failed");
                false
            }
        };

        ClearReport {
            local_cleared: true,
            remote_cleared,
        }
    }
}
