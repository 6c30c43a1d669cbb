//! Request coalescing ("thundering herd" protection).
//!
//! [`RequestCoalescer`] keeps a registry of in-flight producers keyed by
//! cache key. The first caller to miss on a key spawns the producer; every
//! caller arriving before it settles joins the same shared outcome instead of
//! starting a second one. The check-or-create step is a single non-suspending
//! critical section, so at most one producer is ever live per key.
//!
//! The producer runs as a detached task: a caller that stops waiting (client
//! disconnect) never aborts the shared fetch, it only stops observing it. The
//! registry entry is removed unconditionally when the producer settles,
//! success, failure, or panic alike, so a later miss always starts fresh.


use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Failure of the coalescing machinery itself, distinct from whatever the
/// producer returns.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoalesceError {
    /// The producer task died (panicked) without delivering an outcome.
    #[error("in-flight fetch task failed before producing a result")]
    TaskFailed,
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, CoalesceError>>>;
type Registry<T> = Arc<Mutex<HashMap<String, SharedOutcome<T>>>>;

/// Removes the pending record when the producer task settles, whether it
/// completes, panics, or is torn down with the runtime.
struct FlightGuard<T: Clone> {
    registry: Registry<T>,
    key: String,
}

impl<T: Clone> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

/// Keyed registry of in-flight producer invocations.
pub struct RequestCoalescer<T: Clone> {
    in_flight: Registry<T>,
}

impl<T: Clone> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Clone> std::fmt::Debug for RequestCoalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` for `key`, or joins the producer already in flight.
    ///
    /// All concurrent callers for the same key receive clones of the exact
    /// same outcome. The producer is invoked at most once per registry
    /// generation; once it settles the record is gone and the next call
    /// starts a new invocation.
    pub async fn run<F>(&self, key: &str, producer: F) -> Result<T, CoalesceError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (shared, created) = {
            let mut in_flight = self.in_flight.lock();
            if let Some(existing) = in_flight.get(key) {
                debug!(key, "joining in-flight fetch");
                (existing.clone(), None)
            } else {
                let (tx, rx) = oneshot::channel::<T>();
                let shared: SharedOutcome<T> =
                    async move { rx.await.map_err(|_| CoalesceError::TaskFailed) }
                        .boxed()
                        .shared();
                in_flight.insert(key.to_string(), shared.clone());
                (shared, Some(tx))
            }
        };

        if let Some(tx) = created {
            debug!(key, "starting fetch for key");
            let guard = FlightGuard {
                registry: Arc::clone(&self.in_flight),
                key: key.to_string(),
            };
            tokio::spawn(async move {
                let outcome = producer.await;
                // Record removal is ordered before waiters wake, so a caller
                // seeing the outcome can never also observe a stale record.
                drop(guard);
                // Waiters may all have gone away; that is fine.
                let _ = tx.send(outcome);
            });
        }

        shared.await
    }

    /// Number of pending fetch records currently registered.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// True if a pending fetch record exists for `key`.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains_key(key)
    }
}
