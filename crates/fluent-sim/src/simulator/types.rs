//! Error types surfaced by the simulator.

use crate::request::RecordedRequest;
use chrono::{DateTime, Utc};
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Errors returned by the simulator API.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to bind {0}: {1}")]
    Bind(String, String),
    #[error("Simulator is already running")]
    AlreadyRunning,
    #[error("Simulator is not running")]
    NotRunning,
    #[error(transparent)]
    Dispatch(#[from] AggregateDispatchError),
    #[error(transparent)]
    UnexpectedRequests(#[from] UnexpectedRequests),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A failure while answering one matched request.
#[derive(Debug, Clone, Error)]
#[error("{method} {url}: {message}")]
pub struct DispatchError {
    pub method: String,
    pub url: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl DispatchError {
    pub(crate) fn new(request: &RecordedRequest, error: &anyhow::Error) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            message: format!("{error:#}"),
            occurred_at: Utc::now(),
        }
    }
}

/// Every dispatch failure collected since the simulator started, oldest first.
#[derive(Debug, Clone)]
pub struct AggregateDispatchError {
    errors: Vec<DispatchError>,
}

impl AggregateDispatchError {
    pub(crate) fn new(errors: Vec<DispatchError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[DispatchError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<DispatchError> {
        self.errors
    }
}

impl fmt::Display for AggregateDispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} request(s) failed while the simulator was running",
            self.errors.len()
        )?;
        for (i, error) in self.errors.iter().enumerate() {
            write!(f, "\n  [{}] {} at {}", i + 1, error, error.occurred_at.to_rfc3339())?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateDispatchError {}

/// Requests that matched no route, reported on stop when configured to fail.
#[derive(Debug, Clone)]
pub struct UnexpectedRequests {
    requests: Vec<RecordedRequest>,
}

impl UnexpectedRequests {
    pub(crate) fn new(requests: Vec<RecordedRequest>) -> Self {
        Self { requests }
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    /// Multi-line description of every unexpected request.
    pub fn report(&self) -> String {
        let mut out = String::from("One or more unexpected requests were received:\n");
        for request in &self.requests {
            // Writing to a String cannot fail.
            let _ = write_request(&mut out, request);
        }
        out
    }
}

impl fmt::Display for UnexpectedRequests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

impl std::error::Error for UnexpectedRequests {}

fn write_request(out: &mut String, request: &RecordedRequest) -> fmt::Result {
    writeln!(out, "{}", "-".repeat(50))?;
    writeln!(out, "Time of Request: {}", request.received_at.to_rfc3339())?;
    writeln!(out, "URL: {}", request.url)?;
    writeln!(out, "HTTP Method: {}", request.method)?;
    writeln!(
        out,
        "Content Type: {}",
        request.content_type.as_deref().unwrap_or("")
    )?;
    writeln!(out, "Accept Types: {}", request.accept_types.join(", "))?;
    writeln!(
        out,
        "User Agent: {}",
        request.user_agent.as_deref().unwrap_or("")
    )?;
    writeln!(out, "User Languages: {}", request.user_languages.join(", "))?;
    writeln!(out, "Raw URL: {}", request.raw_url)?;
    writeln!(out, "Headers:")?;
    for (name, value) in &request.headers {
        writeln!(out, "  {name}: {value}")?;
    }
    writeln!(out, "Query String Parameters:")?;
    for (key, value) in &request.query {
        writeln!(out, "  {key}: {value}")?;
    }
    writeln!(out, "Cookies:")?;
    for cookie in &request.cookies {
        writeln!(out, "  {} = {}", cookie.name, cookie.value)?;
    }
    writeln!(out, "Request Body:")?;
    if request.body.is_empty() {
        writeln!(out, "[No Body]")
    } else {
        writeln!(out, "{}", request.body)
    }
}

/// Returned from the hyper service to drop a connection without a response.
/// The client sees the connection closed (FIN), not reset.
#[derive(Debug, Error)]
#[error("connection aborted by route configuration")]
pub(crate) struct ConnectionAborted;
