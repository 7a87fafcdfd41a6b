//! Load testing through the edge while the route table changes.

use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use mfe_router::compute::{ComputeService, HttpTarget};
use mfe_router::routing::PathPattern;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_during_route_churn() {
    // 1. Setup mock backend and dispatcher
    let backend_addr: SocketAddr = common::start_mock_backend("Hello from home").await;
    let config = common::test_config();
    let app = mfe_router::start(&config, Path::new(".")).await.unwrap();
    let router = app.deployment.shared.router.clone();

    // 2. Flip the home rule on and off while traffic runs
    let churn_router = router.clone();
    let churn = tokio::spawn(async move {
        for _ in 0..50 {
            let target = HttpTarget::new(&format!("http://{}", backend_addr), Duration::from_secs(1)).unwrap();
            let home = ComputeService::new("home", std::sync::Arc::new(target));
            home.register(&churn_router, PathPattern::parse("/home*").unwrap(), 100).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            home.deregister(&churn_router).unwrap();
        }
    });

    // 3. Run load
    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/home", app.edge_addr);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client.get(&url).send().await.unwrap();
                assert_eq!(res.status(), 200);
                let body = res.text().await.unwrap();
                // Either the whole old table or the whole new one.
                assert!(
                    body == "Hello from home" || body == "Default response from ALB!",
                    "unexpected body: {}",
                    body
                );
                latencies.push(req_start.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    churn.await.unwrap();

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    assert_eq!(all_latencies.len(), total_requests);
    assert!(router.rules().is_empty());
    app.stop().await;
}
