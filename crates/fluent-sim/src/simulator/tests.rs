//! Tests for the simulator module.
//!
//! These run a real listener on an OS-assigned port:
//! - Lifecycle (start, stop, restart, misuse)
//! - Dispatch outcomes (match, 501, CORS, dispatch errors)
//! - Stop-time reporting

use super::*;
use crate::config::SimulatorConfig;
use crate::serializer::JsonSerializer;
use tracing_test::traced_test;

fn local() -> Simulator {
    Simulator::bind("127.0.0.1:0")
}

#[tokio::test]
async fn test_start_returns_bound_address() {
    let sim = local();
    assert!(!sim.is_running());
    assert!(sim.local_addr().is_none());

    let addr = sim.start().await.unwrap();
    assert_ne!(addr.port(), 0);
    assert_eq!(sim.local_addr(), Some(addr));
    assert_eq!(sim.url("/test"), format!("http://{addr}/test"));
    assert_eq!(sim.url("test"), format!("http://{addr}/test"));

    sim.stop().await.unwrap();
    assert!(!sim.is_running());
}

#[tokio::test]
async fn test_lifecycle_misuse() {
    let sim = local();
    assert!(matches!(sim.stop().await, Err(SimulatorError::NotRunning)));

    sim.start().await.unwrap();
    assert!(matches!(sim.start().await, Err(SimulatorError::AlreadyRunning)));
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_after_stop() {
    let sim = local();
    sim.get("/test").responds("TEST");

    sim.start().await.unwrap();
    sim.stop().await.unwrap();

    sim.start().await.unwrap();
    let body = reqwest::get(sim.url("/test")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "TEST");
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected_on_start() {
    let mut config = SimulatorConfig::default();
    config.concurrency_limit = 0;
    let sim = Simulator::new(config);
    assert!(matches!(
        sim.start().await,
        Err(SimulatorError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_port_in_use_is_bind_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let sim = Simulator::bind(format!("http://127.0.0.1:{port}/"));
    assert!(matches!(sim.start().await, Err(SimulatorError::Bind(_, _))));
}

#[tokio::test]
async fn test_matched_and_unmatched_requests() {
    let sim = local();
    sim.get("/test").responds("TEST");
    sim.start().await.unwrap();

    let ok = reqwest::get(sim.url("/test")).await.unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.text().await.unwrap(), "TEST");

    let missing = reqwest::get(sim.url("/nope")).await.unwrap();
    assert_eq!(missing.status(), 501);

    assert_eq!(sim.received_requests().len(), 2);
    let unexpected = sim.unexpected_requests();
    assert_eq!(unexpected.len(), 1);
    assert_eq!(unexpected[0].path, "/nope");

    // Unmatched requests are not failures unless configured.
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_clear_received_requests() {
    let sim = local();
    sim.start().await.unwrap();
    reqwest::get(sim.url("/a")).await.unwrap();
    assert_eq!(sim.received_requests().len(), 1);

    sim.clear_received_requests();
    assert!(sim.received_requests().is_empty());
    assert!(sim.unexpected_requests().is_empty());
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_fail_on_unexpected_requests() {
    let config = SimulatorConfig {
        fail_on_unexpected_requests: true,
        ..SimulatorConfig::default()
    };
    let sim = Simulator::new(config);
    sim.start().await.unwrap();

    reqwest::Client::new()
        .get(sim.url("/unknown?key=value"))
        .header("User-Agent", "sim-tests")
        .send()
        .await
        .unwrap();

    let err = sim.stop().await.unwrap_err();
    let unexpected = match err {
        SimulatorError::UnexpectedRequests(unexpected) => unexpected,
        other => panic!("expected unexpected requests, got {other:?}"),
    };
    assert_eq!(unexpected.requests().len(), 1);
    let report = unexpected.to_string();
    assert!(report.starts_with("One or more unexpected requests were received:"));
    assert!(report.contains("HTTP Method: GET"));
    assert!(report.contains("Raw URL: /unknown?key=value"));
    assert!(report.contains("  key: value"));
    assert!(report.contains("User Agent: sim-tests"));
    assert!(report.contains("[No Body]"));
}

#[tokio::test]
async fn test_dispatch_errors_take_precedence() {
    let config = SimulatorConfig {
        fail_on_unexpected_requests: true,
        ..SimulatorConfig::default()
    };
    let sim = Simulator::new(config);
    sim.get("/boom")
        .try_handled_by(|_| anyhow::bail!("handler exploded"));
    sim.start().await.unwrap();

    let response = reqwest::get(sim.url("/boom")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "handler exploded");
    reqwest::get(sim.url("/unknown")).await.unwrap();
    assert_eq!(sim.dispatch_errors().len(), 1);

    let err = sim.stop().await.unwrap_err();
    let aggregate = match err {
        SimulatorError::Dispatch(aggregate) => aggregate,
        other => panic!("expected dispatch errors, got {other:?}"),
    };
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate.errors()[0].method, "GET");
    assert!(aggregate.errors()[0].url.ends_with("/boom"));

    // Errors are reported once.
    sim.start().await.unwrap();
    assert!(matches!(
        sim.stop().await,
        Err(SimulatorError::UnexpectedRequests(_))
    ));
}

#[tokio::test]
async fn test_cors_preflight_and_headers() {
    let sim = local();
    sim.enable_cors();
    sim.get("/test").responds("TEST");
    sim.start().await.unwrap();

    let client = reqwest::Client::new();
    let preflight = client
        .request(reqwest::Method::OPTIONS, sim.url("/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 200);
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        preflight.headers()["access-control-allow-headers"],
        "Authorization, Content-Type"
    );
    assert_eq!(
        preflight.headers()["access-control-allow-methods"],
        "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS, MERGE"
    );

    let response = client.get(sim.url("/test")).send().await.unwrap();
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let missing = client.get(sim.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 501);
    assert_eq!(
        missing.headers()["access-control-allow-headers"],
        "Authorization, Content-Type"
    );

    // The preflight is journaled but is not an unexpected request.
    assert_eq!(sim.received_requests().len(), 3);
    assert_eq!(sim.unexpected_requests().len(), 1);
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_unreadable_body_is_journaled_and_rejected() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let sim = local();
    sim.post("/test").responds("TEST");
    let addr = sim.start().await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"POST /test HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\nZZZ\r\n",
        )
        .await
        .unwrap();
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = tokio::time::timeout(std::time::Duration::from_secs(2), stream.read(&mut chunk))
            .await
            .unwrap()
            .unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }
    let reply = String::from_utf8_lossy(&raw);
    assert!(reply.starts_with("HTTP/1.1 400"), "unexpected reply: {reply}");

    let journal = sim.received_requests();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].method, "POST");
    assert_eq!(journal[0].path, "/test");
    assert!(sim.dispatch_errors().is_empty());
    assert!(sim.unexpected_requests().is_empty());
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_options_route_without_cors() {
    let sim = local();
    sim.options("/test").with_code(204);
    sim.start().await.unwrap();

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, sim.url("/test"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    assert!(!response.headers().contains_key("access-control-allow-origin"));
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_serializer_reaches_routes_and_requests() {
    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Order {
        id: u32,
    }

    let sim = local().with_serializer(JsonSerializer);
    sim.post("/orders").responds_with(&Order { id: 7 }).unwrap();
    sim.start().await.unwrap();

    let body = reqwest::Client::new()
        .post(sim.url("/orders"))
        .body(r#"{"id":1}"#)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"{"id":7}"#);

    let received: Order = sim.received_requests()[0].body_as().unwrap();
    assert_eq!(received, Order { id: 1 });
    sim.stop().await.unwrap();
}

#[tokio::test]
async fn test_drop_stops_listener() {
    let addr = {
        let sim = local();
        sim.start().await.unwrap()
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
#[traced_test]
async fn test_lifecycle_is_logged() {
    let sim = local();
    sim.get("/logged");
    assert!(logs_contain("Registered route GET /logged"));

    sim.start().await.unwrap();
    assert!(logs_contain("Simulator listening on"));
    sim.stop().await.unwrap();
}
