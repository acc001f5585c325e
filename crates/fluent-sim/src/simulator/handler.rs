//! Per-request dispatch.

use super::core::SharedState;
use super::types::{ConnectionAborted, DispatchError};
use crate::request::RecordedRequest;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-headers", "Authorization, Content-Type"),
    (
        "access-control-allow-methods",
        "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS, MERGE",
    ),
];

/// Addresses of the connection a request arrived on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionContext {
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
}

/// Answer one request.
///
/// Never fails except to abort the connection. An unreadable body is journaled
/// and answered with 400; a failure while rendering a matched route becomes a
/// 500 response and a recorded [`DispatchError`].
pub(crate) async fn handle_request(
    req: Request<Incoming>,
    state: Arc<SharedState>,
    ctx: ConnectionContext,
) -> Result<Response<Full<Bytes>>, ConnectionAborted> {
    let received_at = Utc::now();
    let (parts, body) = req.into_parts();
    let serializer = state.serializer();
    let cors = state.cors_enabled();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let request = RecordedRequest::from_parts(
                &parts,
                &[],
                ctx.remote_addr,
                ctx.local_addr,
                received_at,
                serializer,
            );
            warn!(
                "Failed to read body of {} {}: {}",
                request.method, request.raw_url, e
            );
            state.requests.append(request);
            return Ok(finish(
                build_response(StatusCode::BAD_REQUEST, Bytes::new()),
                cors,
            ));
        }
    };

    let request = RecordedRequest::from_parts(
        &parts,
        &body,
        ctx.remote_addr,
        ctx.local_addr,
        received_at,
        serializer,
    );
    state.requests.append(request.clone());

    if cors && parts.method == Method::OPTIONS {
        debug!("CORS preflight for {}", request.raw_url);
        return Ok(finish(build_response(StatusCode::OK, Bytes::new()), cors));
    }

    let Some(route) = state
        .routes
        .find_match(&request.method, &request.path, &request.query)
    else {
        warn!("No route matches {} {}", request.method, request.raw_url);
        state.unexpected.append(request);
        return Ok(finish(
            build_response(StatusCode::NOT_IMPLEMENTED, Bytes::new()),
            cors,
        ));
    };

    let definition = route.next_response();
    if definition.aborts_immediately() {
        debug!("Aborting connection for {} {}", request.method, request.raw_url);
        return Err(ConnectionAborted);
    }

    route.record(request.clone());
    route.wait_until_ready().await;

    let response = match definition.render(&request) {
        Ok(response) => response,
        Err(e) => fail(&state, &request, &e),
    };
    Ok(finish(response, cors))
}

/// Record a dispatch failure and turn it into a 500 carrying the message.
fn fail(state: &SharedState, request: &RecordedRequest, error: &anyhow::Error) -> Response<Full<Bytes>> {
    let dispatch_error = DispatchError::new(request, error);
    error!(
        "Failed to answer {} {}: {}",
        dispatch_error.method, dispatch_error.url, dispatch_error.message
    );
    let mut response = build_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        Bytes::from(dispatch_error.message.clone()),
    );
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    state.errors.append(dispatch_error);
    response
}

fn finish(mut response: Response<Full<Bytes>>, cors: bool) -> Response<Full<Bytes>> {
    if cors {
        let headers = response.headers_mut();
        for (name, value) in CORS_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }
    response
}

fn build_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}
