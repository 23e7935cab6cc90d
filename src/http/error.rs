//! Mapping of gateway errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::saga::SagaError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No matching route found")]
    NoRoute,

    #[error("Invalid JSON payload")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("Failed to read request body")]
    Body(#[source] axum::Error),

    #[error("Service unavailable after retries: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Saga failed: {0}")]
    Saga(#[from] SagaError),

    #[error("Saga aborted: {0}")]
    SagaAborted(#[source] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoRoute => StatusCode::NOT_FOUND,
            ApiError::InvalidPayload(_) | ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Saga(_) | ApiError::SagaAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_maps_to_503() {
        let err = ApiError::from(DispatchError::NoHealthyEndpoint {
            service: "calendar-service".into(),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            err.to_string(),
            "Service unavailable after retries: no healthy endpoint available for service 'calendar-service'"
        );
    }

    #[test]
    fn test_invalid_payload_maps_to_400() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let response = ApiError::InvalidPayload(parse_err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
