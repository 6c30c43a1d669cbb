//! HTTP gateway (Axum) over the proxy core.
//!
//! This module is primarily used by the `relay` server binary.

pub mod error;
pub mod handler;
pub mod state;
pub mod validate;


use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{RELAY_UPSTREAM_STATUS_HEADER, proxy_handler};
pub use state::HandlerState;
pub use validate::{ValidateError, canonicalize_target};

use crate::cache::remote::RemoteStore;
use crate::upstream::Origin;

pub fn create_router_with_state<R, O>(state: HandlerState<R, O>) -> Router
where
    R: RemoteStore + 'static,
    O: Origin + 'static,
{
    Router::new()
        .route("/proxy", get(handler::proxy_handler))
        .route("/healthz", get(handler::health_handler))
        .route("/metrics", get(handler::metrics_handler))
        .route("/metrics/reset", post(handler::metrics_reset_handler))
        .route("/cache/clear", post(handler::cache_clear_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
