//! Request identification and header forwarding.
//!
//! # Responsibilities
//! - Generate a UUID request ID when the client sent none
//! - Decide which inbound headers are forwarded upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Hop-by-hop headers stay on their own connection (RFC 9110 §7.6.1)
//! - `host` and `content-length` are recomputed for the upstream request

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates v4 UUID request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID of an inbound request, or `-` when absent.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers safe to send on to an upstream service.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    strip(headers, &["host", "content-length"])
}

/// Headers safe to relay from an upstream response to the client.
pub fn relayable_headers(headers: &HeaderMap) -> HeaderMap {
    strip(headers, &["content-length"])
}

fn strip(headers: &HeaderMap, extra: &[&str]) -> HeaderMap {
    let mut kept = headers.clone();
    for name in HOP_BY_HOP.iter().chain(extra) {
        kept.remove(*name);
    }
    kept
}
