//! Dispatcher-backed saga steps and the gateway's login saga.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CALENDAR_SERVICE, USER_SERVICE};
use crate::dispatch::{RequestDispatcher, UpstreamRequest, UpstreamResponse};
use crate::saga::error::StepError;
use crate::saga::plan::SagaPlan;
use crate::saga::step::{SagaStep, StepContext};

/// Name of the plan behind `POST /api/execute_saga`.
pub const LOGIN_SAGA: &str = "login-calendar-status";

/// Longest upstream body kept in a rejection error.
const MAX_ERROR_BODY: usize = 512;

/// Credentials posted to `/api/execute_saga`.
#[derive(Clone, Serialize, Deserialize)]
pub struct SagaPayload {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SagaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaPayload")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

type BuildRequest<P> = Box<dyn Fn(&StepContext<P>) -> Result<UpstreamRequest, StepError> + Send + Sync>;
type BuildCompensation<P> =
    Box<dyn Fn(&StepContext<P>, &Value) -> Result<UpstreamRequest, StepError> + Send + Sync>;

/// A saga step that calls a service through the [`RequestDispatcher`].
pub struct DispatchStep<P> {
    name: String,
    service: String,
    dispatcher: Arc<RequestDispatcher>,
    request: BuildRequest<P>,
    compensation: Option<BuildCompensation<P>>,
    expected: StatusCode,
}

impl<P: Send + Sync + 'static> DispatchStep<P> {
    pub fn new<F>(
        name: impl Into<String>,
        service: impl Into<String>,
        dispatcher: Arc<RequestDispatcher>,
        request: F,
    ) -> Self
    where
        F: Fn(&StepContext<P>) -> Result<UpstreamRequest, StepError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            service: service.into(),
            dispatcher,
            request: Box::new(request),
            compensation: None,
            expected: StatusCode::OK,
        }
    }

    /// Request that undoes this step, sent to the same service.
    pub fn with_compensation<F>(mut self, compensation: F) -> Self
    where
        F: Fn(&StepContext<P>, &Value) -> Result<UpstreamRequest, StepError> + Send + Sync + 'static,
    {
        self.compensation = Some(Box::new(compensation));
        self
    }

    /// Status the service must answer with for the step to succeed.
    pub fn expect_status(mut self, status: StatusCode) -> Self {
        self.expected = status;
        self
    }

    async fn call(&self, request: &UpstreamRequest, expected: Option<StatusCode>) -> Result<Value, StepError> {
        let response = self.dispatcher.dispatch(&self.service, request).await?;

        let accepted = match expected {
            Some(status) => response.status == status,
            None => response.status.is_success(),
        };
        if !accepted {
            return Err(StepError::Rejected {
                status: response.status.as_u16(),
                body: error_body(&response),
            });
        }
        Ok(body_value(&response))
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> SagaStep<P> for DispatchStep<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StepContext<P>) -> Result<Value, StepError> {
        let request = (self.request)(ctx)?;
        self.call(&request, Some(self.expected)).await
    }

    async fn compensate(&self, ctx: &StepContext<P>, result: &Value) -> Result<(), StepError> {
        let Some(build) = &self.compensation else {
            tracing::info!(step = %self.name, service = %self.service, "No compensating request, nothing to undo");
            return Ok(());
        };
        let request = build(ctx, result)?;
        self.call(&request, None).await.map(|_| ())
    }
}

fn body_value(response: &UpstreamResponse) -> Value {
    if response.body.is_empty() {
        return Value::Null;
    }
    response
        .json()
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()))
}

fn error_body(response: &UpstreamResponse) -> String {
    let text = String::from_utf8_lossy(&response.body);
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

/// Log in with the user service, then query the user's calendar status.
pub fn login_and_calendar_plan(
    dispatcher: Arc<RequestDispatcher>,
    deadline: Option<Duration>,
) -> SagaPlan<SagaPayload> {
    let login = DispatchStep::new("user-login", USER_SERVICE, dispatcher.clone(), |ctx: &StepContext<SagaPayload>| {
        Ok(UpstreamRequest::json("/api/user/login", ctx.payload.as_ref())?)
    });

    let calendar = DispatchStep::new(
        "calendar-status",
        CALENDAR_SERVICE,
        dispatcher,
        |ctx: &StepContext<SagaPayload>| {
            Ok(UpstreamRequest::json(
                "/api/calendar/status",
                &json!({ "username": ctx.payload.username }),
            )?)
        },
    );

    SagaPlan::builder(LOGIN_SAGA)
        .step(login)
        .step(calendar)
        .deadline(deadline)
        .build()
}
