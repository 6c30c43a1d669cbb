use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::cache::remote::{RemoteStore, RemoteStoreError};
use crate::cache::RELAY_STATUS_HEADER;
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::gateway::validate::canonicalize_target;
use crate::upstream::Origin;

/// Upstream status of the proxied response, surfaced alongside the body.
pub const RELAY_UPSTREAM_STATUS_HEADER: &str = "x-relay-upstream-status";

#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub url: Option<String>,
}

/// `GET /proxy?url=...`: the main proxying path.
#[instrument(skip(state, query), fields(target = tracing::field::Empty))]
pub async fn proxy_handler<R, O>(
    State(state): State<HandlerState<R, O>>,
    Query(query): Query<TargetQuery>,
) -> Result<Response, GatewayError>
where
    R: RemoteStore + 'static,
    O: Origin + 'static,
{
    let key = canonicalize_target(query.url.as_deref())?;
    tracing::Span::current().record("target", tracing::field::display(&key));

    let proxied = state.core.handle(&key).await?;
    info!(status = %proxied.status, upstream = proxied.upstream_status, "request served");

    let mut headers = HeaderMap::new();
    headers.insert(
        RELAY_STATUS_HEADER,
        HeaderValue::from_static(proxied.status.as_header_value()),
    );
    if let Ok(value) = HeaderValue::from_str(&proxied.upstream_status.to_string()) {
        headers.insert(RELAY_UPSTREAM_STATUS_HEADER, value);
    }

    Ok((StatusCode::OK, headers, Json(proxied.payload.into_json())).into_response())
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub remote_cache: &'static str,
    pub timestamp: String,
}

/// `GET /healthz`: liveness plus remote-tier reachability.
///
/// A disabled remote tier is healthy by definition; an unreachable one
/// degrades the probe to 503 while the proxy keeps serving from the local
/// tier.
#[instrument(skip(state))]
pub async fn health_handler<R, O>(State(state): State<HandlerState<R, O>>) -> Response
where
    R: RemoteStore + 'static,
    O: Origin + 'static,
{
    let (status_code, status, remote_cache) = match state.core.cache().remote().ping().await {
        Ok(()) => (StatusCode::OK, "ok", "connected"),
        Err(RemoteStoreError::Disabled) => (StatusCode::OK, "ok", "disabled"),
        Err(err) => {
            warn!(error = %err, "remote cache tier unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            remote_cache,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
        .into_response()
}

/// `GET /metrics`: current counter snapshot.
#[instrument(skip(state))]
pub async fn metrics_handler<R, O>(State(state): State<HandlerState<R, O>>) -> Response
where
    R: RemoteStore + 'static,
    O: Origin + 'static,
{
    Json(state.core.metrics().snapshot()).into_response()
}

#[derive(serde::Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
}

/// `POST /metrics/reset`: zeroes every counter.
#[instrument(skip(state))]
pub async fn metrics_reset_handler<R, O>(State(state): State<HandlerState<R, O>>) -> Response
where
    R: RemoteStore + 'static,
    O: Origin + 'static,
{
    state.core.metrics().reset();
    info!("metrics counters reset");
    Json(ResetResponse { status: "reset" }).into_response()
}

#[derive(serde::Serialize)]
pub struct ClearResponse {
    pub status: &'static str,
    pub local_cleared: bool,
    pub remote_cleared: bool,
}

/// `POST /cache/clear[?url=...]`: drops one entry from both tiers, or
/// everything when no `url` is given.
///
/// Clearing is best-effort per tier; a partial result reports which tier
/// failed rather than failing the call.
#[instrument(skip(state, query))]
pub async fn cache_clear_handler<R, O>(
    State(state): State<HandlerState<R, O>>,
    Query(query): Query<TargetQuery>,
) -> Result<Response, GatewayError>
where
    R: RemoteStore + 'static,
    O: Origin + 'static,
{
    let report = match query.url.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let key = canonicalize_target(Some(raw))?;
            info!(key, "clearing single cache entry");
            state.core.cache().invalidate(&key).await
        }
        _ => {
            info!("clearing all cache entries");
            state.core.cache().clear_all().await
        }
    };

    let status = if report.is_partial() { "partial" } else { "cleared" };
    Ok(Json(ClearResponse {
        status,
        local_cleared: report.local_cleared,
        remote_cleared: report.remote_cleared,
    })
    .into_response())
}
