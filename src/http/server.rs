//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the gateway components from configuration
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Run the cache refresher alongside the server
//! - Stop both on shutdown

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::LiveConfig;
use crate::discovery::{build_registry, CacheRefresher, RefreshSummary, RegistryError, ServiceCache, ServiceRegistry};
use crate::dispatch::{HyperUpstream, RequestDispatcher, Upstream};
use crate::http::handlers;
use crate::http::request::{request_id, UuidRequestId};
use crate::lifecycle::Shutdown;
use crate::load_balancer::LoadBalancer;
use crate::resilience::BreakerRegistry;
use crate::routing::RouteTable;
use crate::saga::{login_and_calendar_plan, SagaPayload, SagaPlan};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub routes: Arc<RouteTable>,
    pub saga: SagaPlan<SagaPayload>,
    pub registry: Arc<dyn ServiceRegistry>,
    pub cache: Arc<ServiceCache>,
    pub config: LiveConfig,
}

/// The gateway's HTTP front end and its background refresh.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Build a server using the configured registry and a hyper upstream client.
    pub fn new(config: LiveConfig) -> Result<Self, RegistryError> {
        let registry = build_registry(&config.load().registry)?;
        Ok(Self::with_components(config, registry, Arc::new(HyperUpstream::new())))
    }

    /// Build a server around an explicit registry and upstream transport.
    pub fn with_components(
        config: LiveConfig,
        registry: Arc<dyn ServiceRegistry>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let snapshot = config.load_full();

        let cache = Arc::new(ServiceCache::new());
        let balancer = Arc::new(LoadBalancer::new(cache.clone()));
        let breakers = Arc::new(BreakerRegistry::new(config.clone()));
        let dispatcher = Arc::new(RequestDispatcher::new(
            balancer,
            breakers,
            upstream,
            config.clone(),
        ));

        let state = AppState {
            saga: login_and_calendar_plan(dispatcher.clone(), snapshot.saga.deadline()),
            routes: Arc::new(RouteTable::from_config(&snapshot.routes)),
            dispatcher,
            registry,
            cache,
            config,
        };

        let router = Self::build_router(state.clone(), Duration::from_secs(snapshot.timeouts.request_secs));
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The saga route sits outside the request timeout: a saga is bounded by
    /// its own deadline and must be allowed to finish compensating.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let timed = Router::new()
            .route("/api/status", get(handlers::get_status))
            .route("/api/status/services", get(handlers::get_services))
            .route("/api/service_discovery", get(handlers::get_service_discovery))
            .fallback(handlers::proxy)
            .layer(TimeoutLayer::new(request_timeout));

        Router::new()
            .route("/api/execute_saga", post(handlers::execute_saga))
            .merge(timed)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn refresher(&self) -> CacheRefresher {
        CacheRefresher::new(
            self.state.cache.clone(),
            self.state.registry.clone(),
            self.state.config.clone(),
        )
    }

    /// Refresh every monitored service once, outside the periodic cycle.
    pub async fn refresh_now(&self) -> Vec<(String, Option<RefreshSummary>)> {
        self.refresher().refresh_all().await
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let refresher = self.refresher();
        let refresh_task = tokio::spawn(refresher.run(shutdown.subscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.notified())
            .await?;

        if let Err(e) = refresh_task.await {
            tracing::error!(error = %e, "Cache refresher task failed");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{live, GatewayConfig, CALENDAR_SERVICE, USER_SERVICE};
    use crate::http::handlers;
    use crate::saga::{SagaPlan, StepError};
    use axum::extract::State;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use crate::discovery::{HealthCheck, ServiceInstance, StaticRegistry};
    use crate::dispatch::{UpstreamError, UpstreamRequest, UpstreamResponse};
    use crate::load_balancer::Endpoint;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Answers every request with 200 and the URL it was sent to.
    #[derive(Default)]
    struct EchoUpstream {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Upstream for EchoUpstream {
        async fn send(
            &self,
            endpoint: &Endpoint,
            request: &UpstreamRequest,
            _timeout: Duration,
        ) -> Result<UpstreamResponse, UpstreamError> {
            let url = endpoint.url_for(&request.path_and_query).to_string();
            self.seen.lock().unwrap().push(url.clone());
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from(url),
            })
        }
    }

    /// Registry whose agent is always unreachable.
    struct DownRegistry;

    #[async_trait]
    impl ServiceRegistry for DownRegistry {
        async fn list_instances(&self, _service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
            Err(RegistryError::Unavailable("agent down".into()))
        }

        async fn ping(&self) -> Result<(), RegistryError> {
            Err(RegistryError::Unavailable("agent down".into()))
        }
    }

    /// Answers 200 after `delay` for every request.
    struct SlowUpstream {
        delay: Duration,
    }

    #[async_trait]
    impl Upstream for SlowUpstream {
        async fn send(
            &self,
            _endpoint: &Endpoint,
            _request: &UpstreamRequest,
            _timeout: Duration,
        ) -> Result<UpstreamResponse, UpstreamError> {
            tokio::time::sleep(self.delay).await;
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"{}"),
            })
        }
    }

    fn passing(id: &str, port: u16) -> ServiceInstance {
        ServiceInstance {
            id: id.into(),
            address: "10.0.0.7".into(),
            port,
            checks: vec![HealthCheck::passing("serfHealth")],
        }
    }

    async fn slow_server(request_secs: u64, deadline_secs: u64) -> GatewayServer {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = request_secs;
        config.saga.deadline_secs = deadline_secs;

        let registry = Arc::new(StaticRegistry::new());
        registry.set_instances(USER_SERVICE, vec![passing("user-1", 4000)]).await;
        registry.set_instances(CALENDAR_SERVICE, vec![passing("cal-1", 4001)]).await;
        let upstream = Arc::new(SlowUpstream {
            delay: Duration::from_secs(10),
        });

        let server = GatewayServer::with_components(live(config), registry, upstream);
        server.refresh_now().await;
        server
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_proxy_through_router() {
        let registry = Arc::new(StaticRegistry::new());
        registry
            .set_instances(
                USER_SERVICE,
                vec![ServiceInstance {
                    id: "user-1".into(),
                    address: "10.0.0.7".into(),
                    port: 4000,
                    checks: vec![HealthCheck::passing("serfHealth")],
                }],
            )
            .await;
        let upstream = Arc::new(EchoUpstream::default());
        let server = GatewayServer::with_components(live(GatewayConfig::default()), registry, upstream.clone());
        server.refresh_now().await;

        let response = server
            .router()
            .oneshot(Request::get("/api/user/profile?full=1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_text(response).await, "http://10.0.0.7:4000/api/user/profile?full=1");
        assert_eq!(upstream.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let server = GatewayServer::with_components(
            live(GatewayConfig::default()),
            Arc::new(StaticRegistry::new()),
            Arc::new(EchoUpstream::default()),
        );

        let response = server
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "No matching route found");
    }

    #[tokio::test]
    async fn test_service_discovery_inactive() {
        let server = GatewayServer::with_components(
            live(GatewayConfig::default()),
            Arc::new(DownRegistry),
            Arc::new(EchoUpstream::default()),
        );

        let response = server
            .router()
            .oneshot(Request::get("/api/service_discovery").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, r#"{"status":"service discovery inactive"}"#);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_cache_empty() {
        let server = GatewayServer::with_components(
            live(GatewayConfig::default()),
            Arc::new(DownRegistry),
            Arc::new(EchoUpstream::default()),
        );

        let results = server.refresh_now().await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, summary)| summary.is_none()));
        assert!(server.state().cache.snapshot(USER_SERVICE).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saga_outlives_request_timeout() {
        // Each call takes 10s: login fits the 15s deadline, the calendar step does not.
        let server = slow_server(1, 15).await;

        let response = server
            .router()
            .oneshot(
                Request::post("/api/execute_saga")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"username":"ann","password":"pw"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(
            body.starts_with("Saga failed: Transaction failed at step 1 (calendar-status)"),
            "unexpected body: {body}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxy_still_bounded_by_request_timeout() {
        let server = slow_server(1, 15).await;

        let response = server
            .router()
            .oneshot(Request::get("/api/user/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_saga_request_still_compensates() {
        let server = GatewayServer::with_components(
            live(GatewayConfig::default()),
            Arc::new(StaticRegistry::new()),
            Arc::new(EchoUpstream::default()),
        );

        let compensations = Arc::new(AtomicU32::new(0));
        let counter = compensations.clone();
        let mut state = server.state().clone();
        state.saga = SagaPlan::builder("abandoned")
            .add_step(
                "reserve",
                |_ctx| Box::pin(async { Ok::<Value, StepError>(json!({"id": 1})) }),
                move |_ctx, _result| {
                    let counter = counter.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), StepError>(())
                    })
                },
            )
            .add_step(
                "slow",
                |_ctx| {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Err::<Value, _>(StepError::Failed("gave up".into()))
                    })
                },
                |_ctx, _result| Box::pin(async { Ok::<(), StepError>(()) }),
            )
            .build();

        let request = handlers::execute_saga(
            State(state),
            HeaderMap::new(),
            Bytes::from_static(br#"{"username":"ann","password":"pw"}"#),
        );
        // The client goes away long before the saga finishes.
        assert!(tokio::time::timeout(Duration::from_secs(1), request).await.is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(compensations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_saga_is_post_only() {
        let server = GatewayServer::with_components(
            live(GatewayConfig::default()),
            Arc::new(StaticRegistry::new()),
            Arc::new(EchoUpstream::default()),
        );

        let response = server
            .router()
            .oneshot(Request::get("/api/execute_saga").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
