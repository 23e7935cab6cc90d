use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::Response,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::error::ApiError;
use crate::http::request::{forwardable_headers, relayable_headers, request_id};
use crate::http::server::AppState;
use crate::dispatch::UpstreamRequest;
use crate::resilience::BreakerSnapshot;
use crate::saga::SagaPayload;

/// Largest inbound body the gateway buffers for forwarding.
pub const MAX_REQUEST_BYTES: usize = 2 * 1024 * 1024;

#[derive(Serialize)]
pub struct EndpointStatus {
    pub instance_id: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub endpoints: Vec<EndpointStatus>,
    pub breaker: Option<BreakerSnapshot>,
}

pub async fn get_status() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "API Gateway is running",
    }))
}

pub async fn get_service_discovery(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.registry.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "service discovery is up" })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Service registry unreachable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "service discovery inactive" })),
            )
        }
    }
}

pub async fn get_services(State(state): State<AppState>) -> Json<Vec<ServiceStatus>> {
    let breakers = state.dispatcher.breakers().snapshots();
    let services = state.config.load().service_names();

    let statuses = services
        .into_iter()
        .map(|name| {
            let endpoints = state
                .cache
                .snapshot(&name)
                .map(|list| {
                    list.iter()
                        .map(|e| EndpointStatus {
                            instance_id: e.instance_id.clone(),
                            url: e.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            let breaker = breakers.iter().find(|b| b.service == name).cloned();

            ServiceStatus {
                name,
                endpoints,
                breaker,
            }
        })
        .collect();

    Json(statuses)
}

pub async fn execute_saga(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let request_id = request_id(&headers);
    let payload: SagaPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(request_id, error = %e, "Rejected saga payload");
        ApiError::InvalidPayload(e)
    })?;

    tracing::info!(request_id, plan = state.saga.name(), username = %payload.username, "Executing saga");

    // Run on a separate task so a dropped request cannot interrupt rollback.
    let result = state.saga.spawn(payload).await.map_err(|e| {
        tracing::error!(request_id, plan = state.saga.name(), error = %e, "Saga task aborted");
        ApiError::SagaAborted(e)
    })?;

    match result {
        Ok(outcome) => {
            tracing::info!(
                request_id,
                plan = %outcome.plan,
                elapsed = ?outcome.elapsed,
                "Saga executed successfully"
            );
            Ok("Saga executed successfully")
        }
        Err(e) => {
            tracing::error!(
                request_id,
                plan = %e.plan,
                step = %e.failed_step,
                index = e.failed_step_index,
                compensation_failures = e.compensation_errors.len(),
                error = %e.action_error,
                "Saga failed"
            );
            Err(ApiError::Saga(e))
        }
    }
}

/// Forward a request to the service owning its path.
pub async fn proxy(State(state): State<AppState>, request: Request<Body>) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).to_string();

    let Some(route) = state.routes.resolve(&path) else {
        tracing::warn!(request_id = %request_id, path = %path, "No route matched");
        return Err(ApiError::NoRoute);
    };
    let service = route.service.clone();

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_REQUEST_BYTES)
        .await
        .map_err(ApiError::Body)?;

    let upstream_request = UpstreamRequest {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or(path),
        headers: forwardable_headers(&parts.headers),
        body,
    };

    tracing::debug!(
        request_id = %request_id,
        service = %service,
        method = %upstream_request.method,
        path = %upstream_request.path_and_query,
        "Proxying request"
    );

    let upstream = state
        .dispatcher
        .dispatch(&service, &upstream_request)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id, service = %service, error = %e, "Dispatch failed");
            ApiError::Dispatch(e)
        })?;

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = relayable_headers(&upstream.headers);
    Ok(response)
}
