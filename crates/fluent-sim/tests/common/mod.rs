//! Shared helpers for the integration tests.

#![allow(dead_code)]

use fluent_sim::Simulator;
use reqwest::Client;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route simulator logs to the test output; `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fluent_sim=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A simulator on an OS-assigned loopback port, not yet started.
pub fn simulator() -> Simulator {
    init_tracing();
    Simulator::bind("127.0.0.1:0")
}

pub fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
}
