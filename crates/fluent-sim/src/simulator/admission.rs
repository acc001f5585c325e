//! Accept loop with a bounded permit pool.
//!
//! One permit is taken per accepted connection and released as soon as the
//! connection task starts, so the pool bounds how many connections are being
//! handed off at once rather than how many requests are in flight.

use super::core::SharedState;
use super::handler::{handle_request, ConnectionContext};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info};

pub(crate) struct AdmissionController {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl AdmissionController {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Accept connections until `shutdown` fires or its sender goes away.
    pub(crate) async fn run(
        self,
        listener: TcpListener,
        state: Arc<SharedState>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Listener has no local address: {}", e);
                return;
            }
        };
        debug!(
            address = %local_addr,
            concurrency_limit = self.limit,
            "Accept loop started"
        );

        loop {
            let permit = tokio::select! {
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };

            let (stream, remote_addr) = tokio::select! {
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Accept error on {}: {}", local_addr, e);
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            let state = Arc::clone(&state);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                drop(permit);
                let ctx = ConnectionContext {
                    local_addr,
                    remote_addr,
                };
                serve_connection(stream, ctx, state, shutdown).await;
            });
        }

        info!("Simulator on {} shutting down", local_addr);
    }
}

async fn serve_connection(
    stream: TcpStream,
    ctx: ConnectionContext,
    state: Arc<SharedState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_request(req, state, ctx).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        debug!("Connection from {} closed: {}", ctx.remote_addr, e);
    }
}
