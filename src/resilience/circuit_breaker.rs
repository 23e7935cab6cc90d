//! Circuit breaker for downstream service protection.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: service assumed down, attempts fail fast
//! - Half-Open: a single probe tests whether the service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_limit
//! Open → Half-Open: first call after open_timeout since the last failure
//! Half-Open → Closed: probe succeeds (failure count reset)
//! Half-Open → Open: probe fails (last failure time reset)
//! ```
//!
//! # Design Decisions
//! - One breaker per downstream service, shared by all callers (see `breakers.rs`)
//! - One attempt per `call`; retrying belongs to the dispatcher
//! - The state lock is held only to admit a call and to record its outcome,
//!   never across the outbound call itself
//! - Single probe in Half-Open; concurrent callers fail fast until it settles

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Thresholds governing a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures that trip the breaker.
    pub failure_limit: u32,
    /// How long the breaker stays open after the last failure.
    pub open_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_limit: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Errors returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without running the operation.
    #[error("circuit breaker for '{service}' is open, retry in {retry_in:?}")]
    Open { service: String, retry_in: Duration },

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of a breaker, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_limit: u32,
    pub open_timeout_secs: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// How a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

/// Failure-counting guard around single attempts against one service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `service`.
    pub fn new(service: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            service: service.into(),
            settings,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Run `operation` once if the breaker admits it, and record the outcome.
    ///
    /// Dropping the returned future while a Half-Open probe is in flight puts
    /// the breaker back to Open so the next caller can probe again.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.admit()?;
        let mut guard = ProbeGuard {
            breaker: self,
            armed: admission == Admission::Probe,
        };

        let result = operation().await;
        guard.armed = false;

        match &result {
            Ok(_) => self.record_success(admission),
            Err(_) => self.record_failure(admission),
        }
        result.map_err(BreakerError::Inner)
    }

    /// Name of the protected service.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    /// Current state.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Consecutive failures since the last reset.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            service: self.service.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_limit: self.settings.failure_limit,
            open_timeout_secs: self.settings.open_timeout.as_secs(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Every critical section leaves the state consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit<E>(&self) -> Result<Admission, BreakerError<E>> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(Admission::Normal),
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(self.settings.open_timeout);

                if elapsed < self.settings.open_timeout {
                    drop(inner);
                    return Err(self.reject(self.settings.open_timeout - elapsed));
                }

                inner.state = BreakerState::HalfOpen;
                inner.probe_in_flight = true;
                drop(inner);
                self.transitioned(BreakerState::Open, BreakerState::HalfOpen);
                Ok(Admission::Probe)
            }
            BreakerState::HalfOpen => {
                drop(inner);
                Err(self.reject(Duration::ZERO))
            }
        }
    }

    fn reject<E>(&self, retry_in: Duration) -> BreakerError<E> {
        tracing::debug!(
            service = %self.service,
            retry_in = ?retry_in,
            "Circuit breaker open, skipping call"
        );
        metrics::record_breaker_rejection(&self.service);
        BreakerError::Open {
            service: self.service.clone(),
            retry_in,
        }
    }

    fn record_success(&self, admission: Admission) {
        let mut inner = self.lock();
        match admission {
            Admission::Probe => {
                inner.failure_count = 0;
                inner.probe_in_flight = false;
                inner.state = BreakerState::Closed;
                drop(inner);
                self.transitioned(BreakerState::HalfOpen, BreakerState::Closed);
            }
            Admission::Normal if inner.state == BreakerState::Closed => {
                inner.failure_count = 0;
            }
            // Admitted while closed but finished after another caller tripped the breaker.
            Admission::Normal => {}
        }
    }

    fn record_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        let now = Instant::now();
        match admission {
            Admission::Probe => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.last_failure = Some(now);
                inner.probe_in_flight = false;
                inner.state = BreakerState::Open;
                drop(inner);
                self.transitioned(BreakerState::HalfOpen, BreakerState::Open);
            }
            Admission::Normal if inner.state == BreakerState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                inner.last_failure = Some(now);
                let failures = inner.failure_count;

                if failures >= self.settings.failure_limit {
                    inner.state = BreakerState::Open;
                    drop(inner);
                    tracing::warn!(
                        service = %self.service,
                        failures,
                        limit = self.settings.failure_limit,
                        "Circuit breaker tripped"
                    );
                    self.transitioned(BreakerState::Closed, BreakerState::Open);
                } else {
                    tracing::debug!(
                        service = %self.service,
                        failures,
                        limit = self.settings.failure_limit,
                        "Circuit breaker failure recorded"
                    );
                }
            }
            Admission::Normal => {}
        }
    }

    fn abandon_probe(&self) {
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            inner.state = BreakerState::Open;
            drop(inner);
            tracing::debug!(service = %self.service, "Probe cancelled before completion");
            self.transitioned(BreakerState::HalfOpen, BreakerState::Open);
        }
    }

    fn transitioned(&self, from: BreakerState, to: BreakerState) {
        tracing::info!(service = %self.service, from = %from, to = %to, "Circuit breaker state change");
        metrics::record_breaker_state(&self.service, to);
    }
}

/// Returns an abandoned probe's slot when the call future is dropped mid-flight.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_probe();
        }
    }
}
