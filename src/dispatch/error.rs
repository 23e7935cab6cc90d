//! Dispatch error types.

use std::time::Duration;
use thiserror::Error;

use crate::dispatch::upstream::UpstreamError;
use crate::resilience::BreakerError;

/// Why one dispatch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("circuit breaker for '{service}' is open, retry in {retry_in:?}")]
    CircuitOpen { service: String, retry_in: Duration },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl AttemptError {
    /// Label used for the attempt outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            AttemptError::CircuitOpen { .. } => "circuit_open",
            AttemptError::Upstream(UpstreamError::Timeout(_)) => "timeout",
            AttemptError::Upstream(UpstreamError::Status { .. }) => "server_error",
            AttemptError::Upstream(_) => "transport_error",
        }
    }
}

impl From<BreakerError<UpstreamError>> for AttemptError {
    fn from(err: BreakerError<UpstreamError>) -> Self {
        match err {
            BreakerError::Open { service, retry_in } => AttemptError::CircuitOpen { service, retry_in },
            BreakerError::Inner(e) => AttemptError::Upstream(e),
        }
    }
}

/// Terminal outcome of a failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no healthy endpoint available for service '{service}'")]
    NoHealthyEndpoint { service: String },

    #[error("service '{service}' unavailable after {attempts} attempts: {source}")]
    ServiceUnavailable {
        service: String,
        attempts: u32,
        #[source]
        source: AttemptError,
    },
}

impl DispatchError {
    pub fn service(&self) -> &str {
        match self {
            DispatchError::NoHealthyEndpoint { service } => service,
            DispatchError::ServiceUnavailable { service, .. } => service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_error_conversion() {
        let open: AttemptError = BreakerError::<UpstreamError>::Open {
            service: "users".into(),
            retry_in: Duration::from_secs(3),
        }
        .into();
        assert_eq!(open.outcome(), "circuit_open");

        let inner: AttemptError = BreakerError::Inner(UpstreamError::Status { status: 502 }).into();
        assert_eq!(inner, AttemptError::Upstream(UpstreamError::Status { status: 502 }));
        assert_eq!(inner.outcome(), "server_error");
    }

    #[test]
    fn test_display_wraps_last_cause() {
        let err = DispatchError::ServiceUnavailable {
            service: "users".into(),
            attempts: 3,
            source: AttemptError::Upstream(UpstreamError::Timeout(Duration::from_secs(2))),
        };
        assert_eq!(
            err.to_string(),
            "service 'users' unavailable after 3 attempts: no response within 2s"
        );
        assert_eq!(err.service(), "users");
    }
}
