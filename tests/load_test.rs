//! Load testing for the gateway: concurrent proxying and concurrent sagas.

use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use api_gateway::config::{CALENDAR_SERVICE, USER_SERVICE};
use api_gateway::discovery::StaticRegistry;

mod common;

use common::{client, instance, start_gateway, start_programmable_backend, test_config};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[tokio::test]
async fn test_load_spreads_across_instances() {
    // 1. Three counting backends
    let counters: Vec<Arc<AtomicU32>> = (0..3).map(|_| Arc::new(AtomicU32::new(0))).collect();
    let mut instances = Vec::new();
    for (i, counter) in counters.iter().enumerate() {
        let counter = counter.clone();
        let addr = start_programmable_backend(move |_req| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (200, "Hello from backend".to_string())
            }
        })
        .await;
        instances.push(instance(&format!("user-{i}"), addr));
    }

    // 2. Gateway over a static registry
    let registry = Arc::new(StaticRegistry::new());
    registry.set_instances(USER_SERVICE, instances).await;
    let gateway = start_gateway(test_config(), registry).await;

    // 3. Run load
    let concurrency = 20;
    let requests_per_task = 30;
    let total_requests = concurrency * requests_per_task;

    let client = client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = gateway.url("/api/user/profile");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    // Round-robin under contention: each instance gets exactly a third.
    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst) as usize, total_requests / 3);
    }

    all_latencies.sort();
    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", percentile(&all_latencies, 0.50));
    println!("P95 Latency:    {:?}", percentile(&all_latencies, 0.95));
    println!("P99 Latency:    {:?}", percentile(&all_latencies, 0.99));
    println!("-------------------------\n");

    gateway.stop().await;
}

#[tokio::test]
async fn test_concurrent_sagas_are_isolated() {
    let calendar_calls = Arc::new(AtomicU32::new(0));
    let cc = calendar_calls.clone();
    let backend = start_programmable_backend(move |req| {
        let cc = cc.clone();
        async move {
            match req.path.as_str() {
                "/api/user/login" => (200, r#"{"token":"t"}"#.to_string()),
                "/api/calendar/status" => {
                    cc.fetch_add(1, Ordering::SeqCst);
                    // Users named "fail-*" have no calendar.
                    if req.body.contains("fail-") {
                        (404, "no calendar".to_string())
                    } else {
                        (200, r#"{"status":"free"}"#.to_string())
                    }
                }
                _ => (404, "not found".to_string()),
            }
        }
    })
    .await;

    let registry = Arc::new(StaticRegistry::new());
    registry.set_instances(USER_SERVICE, vec![instance("user-1", backend)]).await;
    registry.set_instances(CALENDAR_SERVICE, vec![instance("cal-1", backend)]).await;
    // 404s are relayed, never counted against the breaker, so failures do not affect successes.
    let gateway = start_gateway(test_config(), registry).await;

    let client = client();
    let mut tasks = Vec::new();
    for i in 0..40 {
        let client = client.clone();
        let url = gateway.url("/api/execute_saga");
        let username = if i % 2 == 0 { format!("ok-{i}") } else { format!("fail-{i}") };
        tasks.push(tokio::spawn(async move {
            let res = client
                .post(&url)
                .json(&json!({"username": username, "password": "pw"}))
                .send()
                .await
                .unwrap();
            (username, res.status().as_u16())
        }));
    }

    for task in tasks {
        let (username, status) = task.await.unwrap();
        let expected = if username.starts_with("ok-") { 200 } else { 500 };
        assert_eq!(status, expected, "saga for {username}");
    }
    assert_eq!(calendar_calls.load(Ordering::SeqCst), 40);

    gateway.stop().await;
}
