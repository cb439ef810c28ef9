//! Load testing for the load balancer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

mod common;

#[tokio::test]
async fn test_concurrent_requests_split_evenly() {
    let a = common::start_mock_backend("a").await;
    let b = common::start_mock_backend("b").await;
    let c = common::start_mock_backend("c").await;
    let proxy = common::start_proxy(common::build_pool(&[a, b, c])).await;

    let concurrency = 10;
    let requests_per_task = 30;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let mut bodies = Vec::new();
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let (status, body) = common::get(&client, proxy, "/").await;
                assert_eq!(status, 200);
                latencies.push(req_start.elapsed());
                bodies.push(body);
            }
            (bodies, latencies)
        }));
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        let (bodies, task_latencies) = task.await.unwrap();
        for body in bodies {
            *counts.entry(body).or_default() += 1;
        }
        latencies.extend(task_latencies);
    }

    let elapsed = start.elapsed();
    latencies.sort();
    let p99 = latencies[latencies.len() * 99 / 100];
    println!(
        "{} requests in {:?} ({:.0} req/s), p99 {:?}",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64(),
        p99
    );

    assert_eq!(counts.len(), 3);
    for backend in ["a", "b", "c"] {
        assert_eq!(counts[backend], total_requests / 3, "uneven share for {}", backend);
    }
}
