//! Shared remote cache tier.
//!
//! The remote tier is a narrow key-value contract ([`RemoteStore`]) that the
//! rest of the core treats as a pure optimization: it may be disabled,
//! unreachable, or flaky at any time and every failure is absorbed by the
//! caller as a miss. [`RedisStore`] is the production implementation;
//! [`MockRemoteStore`] backs tests.

use std::time::Duration;

use thiserror::Error;

/// Errors from the remote tier. Callers convert all of these into "absent".
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// No remote tier is configured for this process.
    #[error("remote cache tier is disabled")]
    Disabled,

    /// The tier exists but could not serve the call.
    #[error("remote cache tier unavailable: {0}")]
    Unavailable(String),

    /// Redis-level failure (connection, protocol, command).
    #[error("redis error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Minimal key-value contract the core needs from the shared tier. The core
/// never enumerates the tier's contents; it only gets, sets, deletes, and
/// bulk-clears, and probes liveness for health reporting.
pub trait RemoteStore: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, RemoteStoreError>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), RemoteStoreError>> + Send;

    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RemoteStoreError>> + Send;

    fn clear_all(&self)
    -> impl std::future::Future<Output = Result<(), RemoteStoreError>> + Send;

    fn ping(&self) -> impl std::future::Future<Output = Result<(), RemoteStoreError>> + Send;
}

/// Redis-backed remote tier over a reconnecting connection manager.
///
/// Constructed disabled when no URL is configured; every call then reports
/// [`RemoteStoreError::Disabled`] and the proxy runs on the local tier alone.
#[derive(Clone)]
pub struct RedisStore {
    manager: Option<redis::aio::ConnectionManager>,
}

impl RedisStore {
    /// Connects to Redis at `url`. The connection manager reconnects on its
    /// own after transient failures.
    pub async fn connect(url: &str) -> Result<Self, RemoteStoreError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager: Some(manager),
        })
    }

    /// A store with no backend; all operations report `Disabled`.
    pub fn disabled() -> Self {
        Self { manager: None }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.manager.is_some()
    }

    fn manager(&self) -> Result<redis::aio::ConnectionManager, RemoteStoreError> {
        self.manager.clone().ok_or(RemoteStoreError::Disabled)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError> {
        use redis::AsyncCommands;

        let mut conn = self.manager()?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), RemoteStoreError> {
        use redis::AsyncCommands;

        let mut conn = self.manager()?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteStoreError> {
        use redis::AsyncCommands;

        let mut conn = self.manager()?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), RemoteStoreError> {
        let mut conn = self.manager()?;
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteStoreError> {
        let mut conn = self.manager()?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// In-memory remote tier for tests: TTL-aware map with a failure-injection
/// switch and call counters.
#[cfg(any(test, feature = "mock"))]
#[derive(Clone, Default)]
pub struct MockRemoteStore {
    entries: std::sync::Arc<
        parking_lot::RwLock<
            std::collections::HashMap<String, (Vec<u8>, Option<std::time::Instant>)>,
        >,
    >,
    failing: std::sync::Arc<std::sync::atomic::AtomicBool>,
    get_calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
    set_calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
}

#[cfg(any(test, feature = "mock"))]
impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every call fails with `Unavailable`, simulating an
    /// unreachable tier.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Inserts raw bytes directly, bypassing the trait (for seeding tests).
    pub fn seed(&self, key: &str, value: Vec<u8>) {
        self.entries.write().insert(key.to_string(), (value, None));
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> u32 {
        self.set_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), RemoteStoreError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RemoteStoreError::Unavailable(
                "simulated outage".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "mock"))]
impl RemoteStore for MockRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError> {
        self.get_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.check_available()?;

        let mut entries = self.entries.write();
        match entries.get(key) {
            Some((_, Some(deadline))) if std::time::Instant::now() >= *deadline => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), RemoteStoreError> {
        self.set_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.check_available()?;

        let deadline = std::time::Instant::now() + ttl;
        self.entries
            .write()
            .insert(key.to_string(), (value, Some(deadline)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteStoreError> {
        self.check_available()?;
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), RemoteStoreError> {
        self.check_available()?;
        self.entries.write().clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteStoreError> {
        self.check_available()
    }
}
