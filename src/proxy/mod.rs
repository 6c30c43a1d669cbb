//! Per-request orchestration: tiered read, coalesced resilient fetch,
//! populate, respond.
//!
//! [`ProxyCore`] composes the three stateful pieces of the pipeline. It is
//! HTTP-agnostic; the gateway translates its outcome into a response.


use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::cache::{CacheTier, CachedResponse, RelayStatus, TieredCache, TieredLookupResult};
use crate::cache::remote::RemoteStore;
use crate::coalesce::{CoalesceError, RequestCoalescer};
use crate::metrics::Metrics;
use crate::upstream::{FetchError, FetchOutcome, Origin, Payload, ResilientFetcher};

/// Request failures surfaced to the gateway. Cache-tier degradation never
/// appears here; it is absorbed below.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProxyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Coalesce(#[from] CoalesceError),
}

/// Successful outcome of one proxied request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub payload: Payload,
    pub upstream_status: u16,
    pub status: RelayStatus,
}

impl ProxyResponse {
    fn from_entry(entry: CachedResponse, status: RelayStatus) -> Self {
        Self {
            payload: entry.payload,
            upstream_status: entry.upstream_status,
            status,
        }
    }
}

/// The per-request control flow over both cache tiers, the coalescer, and
/// the resilient fetcher.
pub struct ProxyCore<R: RemoteStore, O: Origin> {
    cache: TieredCache<R>,
    fetcher: Arc<ResilientFetcher<O>>,
    coalescer: RequestCoalescer<FetchOutcome>,
    metrics: Arc<Metrics>,
}

impl<R: RemoteStore, O: Origin> std::fmt::Debug for ProxyCore<R, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCore")
            .field("cache", &self.cache)
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}

impl<R, O> ProxyCore<R, O>
where
    R: RemoteStore,
    O: Origin + 'static,
{
    pub fn new(
        cache: TieredCache<R>,
        fetcher: ResilientFetcher<O>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cache,
            fetcher: Arc::new(fetcher),
            coalescer: RequestCoalescer::new(),
            metrics,
        }
    }

    pub fn cache(&self) -> &TieredCache<R> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn coalescer(&self) -> &RequestCoalescer<FetchOutcome> {
        &self.coalescer
    }

    /// Serves one request for the canonicalized key.
    ///
    /// Cache hits return immediately with the owning tier reported. On a
    /// miss the upstream fetch is coalesced per key, both tiers are
    /// populated before the payload is returned, and failures propagate
    /// identically to every waiter without touching the tiers.
    #[instrument(skip(self, key), fields(key = key))]
    pub async fn handle(&self, key: &str) -> Result<ProxyResponse, ProxyError> {
        let started = Instant::now();

        match self.cache.lookup(key).await {
            TieredLookupResult::HitRemote(entry) => {
                self.metrics.record_hit(CacheTier::Remote);
                self.metrics.record_latency(started.elapsed());
                return Ok(ProxyResponse::from_entry(entry, RelayStatus::HitRemote));
            }
            TieredLookupResult::HitLocal(entry) => {
                self.metrics.record_hit(CacheTier::Local);
                self.metrics.record_latency(started.elapsed());
                return Ok(ProxyResponse::from_entry(entry, RelayStatus::HitLocal));
            }
            TieredLookupResult::Miss => {}
        }

        self.metrics.record_miss();
        debug!("cache miss, dispatching coalesced fetch");

        let fetcher = Arc::clone(&self.fetcher);
        let url = key.to_string();
        let outcome = self
            .coalescer
            .run(key, async move { fetcher.fetch(&url).await })
            .await;

        match outcome {
            Ok(Ok(success)) => {
                self.cache
                    .populate(key, &success.payload, success.status)
                    .await;
                self.metrics.record_latency(started.elapsed());
                Ok(ProxyResponse {
                    payload: success.payload,
                    upstream_status: success.status,
                    status: RelayStatus::Fetched,
                })
            }
            Ok(Err(fetch_err)) => {
                self.metrics.record_error();
                Err(ProxyError::Fetch(fetch_err))
            }
            Err(coalesce_err) => {
                self.metrics.record_error();
                Err(ProxyError::Coalesce(coalesce_err))
            }
        }
    }
}
