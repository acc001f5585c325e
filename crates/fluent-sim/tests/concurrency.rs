//! Behaviour under concurrent load.

mod common;

use common::{client, simulator};
use fluent_sim::{SimulatorConfig, SimulatorError};
use futures::future::join_all;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TASKS: usize = 8;
const REQUESTS_PER_TASK: usize = 25;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn journal_survives_concurrent_writers_and_reader() {
    let sim = Arc::new(simulator());
    let route = sim.get("/load");
    route.responds("ok");
    sim.start().await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let sim = Arc::clone(&sim);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut reads = 0usize;
            loop {
                let seen = sim.received_requests().len();
                assert!(seen <= TASKS * REQUESTS_PER_TASK);
                reads += 1;
                if done.load(Ordering::Relaxed) {
                    break reads;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let writers = (0..TASKS).map(|_| {
        let http = client();
        let url = sim.url("/load");
        tokio::spawn(async move {
            for _ in 0..REQUESTS_PER_TASK {
                let response = http.get(&url).send().await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
            }
        })
    });
    for result in join_all(writers).await {
        result.unwrap();
    }

    done.store(true, Ordering::Relaxed);
    assert!(reader.await.unwrap() > 0);

    assert_eq!(sim.received_requests().len(), TASKS * REQUESTS_PER_TASK);
    assert_eq!(route.history().len(), TASKS * REQUESTS_PER_TASK);
    sim.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_limit_of_one_still_serves_everything() {
    let config = SimulatorConfig {
        concurrency_limit: 1,
        ..SimulatorConfig::with_address("127.0.0.1:0")
    };
    let sim = fluent_sim::Simulator::new(config);
    sim.get("/test").responds("TEST");
    sim.start().await.unwrap();

    let requests = (0..20).map(|_| {
        let http = client();
        let url = sim.url("/test");
        async move { http.get(url).send().await.unwrap().status() }
    });
    let statuses = join_all(requests).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::OK));
    assert_eq!(sim.received_requests().len(), 20);
    sim.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pausing_one_route_does_not_block_others() {
    let sim = simulator();
    let paused = sim.get("/paused");
    paused.responds("late").pause();
    sim.get("/free").responds("free");
    sim.start().await.unwrap();

    let pending = {
        let http = client();
        let url = sim.url("/paused");
        tokio::spawn(async move { http.get(url).send().await.unwrap().text().await.unwrap() })
    };

    // Give the paused request time to reach the gate.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished());

    let started = Instant::now();
    let free = client().get(sim.url("/free")).send().await.unwrap();
    assert_eq!(free.text().await.unwrap(), "free");
    assert!(started.elapsed() < Duration::from_secs(2));

    // A paused request is already in the route history while it waits.
    assert_eq!(paused.history().len(), 1);

    paused.resume();
    let body = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("resume should release the paused request")
        .unwrap();
    assert_eq!(body, "late");
    sim.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_to_delayed_route_each_wait() {
    let sim = simulator();
    sim.get("/slow")
        .delay(Duration::from_millis(300))
        .responds("slow");
    sim.start().await.unwrap();

    let started = Instant::now();
    let requests = (0..4).map(|_| {
        let http = client();
        let url = sim.url("/slow");
        async move {
            let begun = Instant::now();
            let body = http.get(url).send().await.unwrap().text().await.unwrap();
            (body, begun.elapsed())
        }
    });
    let results = join_all(requests).await;

    for (body, elapsed) in &results {
        assert_eq!(body, "slow");
        assert!(*elapsed >= Duration::from_millis(300));
    }
    // Delays overlap rather than queue behind each other.
    assert!(started.elapsed() < Duration::from_millis(300 * 4));
    sim.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_are_isolated_and_aggregated_in_order() {
    let sim = simulator();
    sim.get("/fail").try_handled_by(|request| {
        anyhow::bail!("failed {}", request.header("x-attempt").unwrap_or("?"))
    });
    sim.get("/ok").responds("ok");
    sim.start().await.unwrap();
    let http = client();

    for n in 0..3 {
        let failed = http
            .get(sim.url("/fail"))
            .header("x-attempt", n.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.text().await.unwrap(), format!("failed {n}"));

        let ok = http.get(sim.url("/ok")).send().await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    match sim.stop().await {
        Err(SimulatorError::Dispatch(aggregate)) => {
            let messages: Vec<_> = aggregate
                .into_errors()
                .into_iter()
                .map(|e| e.message)
                .collect();
            assert_eq!(messages, vec!["failed 0", "failed 1", "failed 2"]);
        }
        other => panic!("expected aggregated dispatch errors, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_lets_in_flight_requests_finish() {
    let sim = simulator();
    sim.get("/slow")
        .delay(Duration::from_millis(300))
        .responds("finished");
    sim.start().await.unwrap();

    let in_flight = {
        let http = client();
        let url = sim.url("/slow");
        tokio::spawn(async move { http.get(url).send().await.unwrap().text().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    sim.stop().await.unwrap();
    assert_eq!(in_flight.await.unwrap(), "finished");
}
