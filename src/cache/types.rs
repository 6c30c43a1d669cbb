//! Shared cache types: entry format, tier labels, response status.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::upstream::Payload;

/// Response header carrying how the request was served.
pub const RELAY_STATUS_HEADER: &str = "x-relay-status";
pub const RELAY_STATUS_ERROR: &str = "error";

/// How a proxied request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayStatus {
    /// Served from the shared (remote) tier.
    HitRemote,
    /// Served from the in-process bounded tier.
    HitLocal,
    /// Fetched from the upstream origin on a miss.
    Fetched,
}

impl RelayStatus {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            RelayStatus::HitRemote => "hit-remote",
            RelayStatus::HitLocal => "hit-local",
            RelayStatus::Fetched => "fetched",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        !matches!(self, RelayStatus::Fetched)
    }
}

impl std::fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}

/// One of the two cache layers, in fixed read order: remote first, local second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    Remote,
    Local,
}

impl CacheTier {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Remote => "remote",
            CacheTier::Local => "local",
        }
    }
}

/// A cached upstream representation. Entries are created whole by successful
/// fetches and replaced whole; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    pub payload: Payload,
    pub upstream_status: u16,
    /// Absolute expiry, unix epoch milliseconds. Never returned at or past
    /// this instant, independent of what the owning tier's own eviction does.
    pub expires_at_ms: u64,
}

impl CachedResponse {
    pub fn new(payload: Payload, upstream_status: u16, ttl: Duration) -> Self {
        Self {
            payload,
            upstream_status,
            expires_at_ms: now_millis() + ttl.as_millis() as u64,
        }
    }

    /// True once the current time reaches `expires_at_ms`.
    #[inline]
    pub fn is_expired(&self) -> bool {
        now_millis() >= self.expires_at_ms
    }

    /// Serializes for the remote tier (JSON bytes).
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserializes a remote-tier entry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relay_status_header_values() {
        assert_eq!(RelayStatus::HitRemote.as_header_value(), "hit-remote");
        assert_eq!(RelayStatus::HitLocal.as_header_value(), "hit-local");
        assert_eq!(RelayStatus::Fetched.as_header_value(), "fetched");
        assert!(RelayStatus::HitRemote.is_hit());
        assert!(RelayStatus::HitLocal.is_hit());
        assert!(!RelayStatus::Fetched.is_hit());
    }

    #[test]
    fn test_entry_not_expired_within_ttl() {
        let entry = CachedResponse::new(
            Payload::Structured(json!({"x": 1})),
            200,
            Duration::from_secs(60),
        );
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expired_at_deadline() {
        let mut entry = CachedResponse::new(
            Payload::Raw("stale".to_string()),
            200,
            Duration::from_secs(60),
        );
        entry.expires_at_ms = now_millis();
        assert!(entry.is_expired());
    }

    #[test]
    fn test_entry_roundtrips_through_bytes() {
        let entry = CachedResponse::new(
            Payload::Structured(json!({"a": [1, 2, 3]})),
            200,
            Duration::from_secs(60),
        );
        let bytes = entry.to_bytes().expect("serialize");
        let back = CachedResponse::from_bytes(&bytes).expect("deserialize");
        assert_eq!(back, entry);
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        assert!(CachedResponse::from_bytes(b"not json").is_err());
        assert!(CachedResponse::from_bytes(b"{\"half\":").is_err());
    }
}
