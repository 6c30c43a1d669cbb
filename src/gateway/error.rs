use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::{RELAY_STATUS_ERROR, RELAY_STATUS_HEADER};
use crate::gateway::validate::ValidateError;
use crate::proxy::ProxyError;
use crate::upstream::FetchError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidateError),

    #[error("upstream fetch timed out: {0}")]
    UpstreamTimeout(#[source] FetchError),

    #[error("upstream fetch failed: {0}")]
    UpstreamFailure(#[source] FetchError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ProxyError> for GatewayError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Fetch(fetch) if fetch.is_timeout() => GatewayError::UpstreamTimeout(fetch),
            ProxyError::Fetch(fetch) => GatewayError::UpstreamFailure(fetch),
            ProxyError::Coalesce(coalesce) => GatewayError::Internal(coalesce.to_string()),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(ValidateError::PrivateAddress) => StatusCode::FORBIDDEN,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            RELAY_STATUS_HEADER,
            HeaderValue::from_static(RELAY_STATUS_ERROR),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
