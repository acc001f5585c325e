//! The `Simulator` and the state it shares with dispatch tasks.

use super::admission::AdmissionController;
use super::types::{AggregateDispatchError, DispatchError, SimulatorError, UnexpectedRequests};
use crate::config::SimulatorConfig;
use crate::journal::Journal;
use crate::request::RecordedRequest;
use crate::route::{HttpVerb, Route, RouteTable};
use crate::serializer::BodySerializer;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State read by every dispatch task.
pub(crate) struct SharedState {
    pub routes: RouteTable,
    pub requests: Journal<RecordedRequest>,
    pub unexpected: Journal<RecordedRequest>,
    pub errors: Journal<DispatchError>,
    cors: AtomicBool,
    serializer: RwLock<Option<Arc<dyn BodySerializer>>>,
}

impl SharedState {
    fn new(cors: bool) -> Self {
        Self {
            routes: RouteTable::new(),
            requests: Journal::new(),
            unexpected: Journal::new(),
            errors: Journal::new(),
            cors: AtomicBool::new(cors),
            serializer: RwLock::new(None),
        }
    }

    pub fn cors_enabled(&self) -> bool {
        self.cors.load(Ordering::Relaxed)
    }

    pub fn serializer(&self) -> Option<Arc<dyn BodySerializer>> {
        self.serializer.read().clone()
    }
}

struct Running {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// In-process HTTP server answering with configured routes.
pub struct Simulator {
    config: SimulatorConfig,
    state: Arc<SharedState>,
    running: Mutex<Option<Running>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let state = Arc::new(SharedState::new(config.cors));
        Self {
            config,
            state,
            running: Mutex::new(None),
        }
    }

    /// Simulator on `address` with default settings.
    ///
    /// Use port 0 to let the OS pick one; [`Simulator::start`] returns it.
    pub fn bind(address: impl Into<String>) -> Self {
        Self::new(SimulatorConfig::with_address(address))
    }

    /// Serializer used by `responds_with` and `RecordedRequest::body_as`.
    ///
    /// Only routes registered after this call pick it up.
    pub fn with_serializer(self, serializer: impl BodySerializer + 'static) -> Self {
        *self.state.serializer.write() = Some(Arc::new(serializer));
        self
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Add permissive CORS headers to every response and answer `OPTIONS` directly.
    pub fn enable_cors(&self) -> &Self {
        self.state.cors.store(true, Ordering::Relaxed);
        self
    }

    /// Bind the listener and start accepting requests.
    pub async fn start(&self) -> Result<SocketAddr, SimulatorError> {
        self.config
            .validate()
            .map_err(|e| SimulatorError::Configuration(e.to_string()))?;

        if self.running.lock().is_some() {
            return Err(SimulatorError::AlreadyRunning);
        }

        let bind_address = self.config.bind_address().to_string();
        let listener = TcpListener::bind(&bind_address)
            .await
            .map_err(|e| SimulatorError::Bind(bind_address.clone(), e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| SimulatorError::Bind(bind_address.clone(), e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let admission = AdmissionController::new(self.config.concurrency_limit);
        let accept_task = tokio::spawn(admission.run(
            listener,
            Arc::clone(&self.state),
            shutdown_rx,
        ));

        let mut running = self.running.lock();
        if running.is_some() {
            // Lost a race with a concurrent start.
            let _ = shutdown_tx.send(true);
            accept_task.abort();
            return Err(SimulatorError::AlreadyRunning);
        }
        *running = Some(Running {
            addr,
            shutdown_tx,
            accept_task,
        });

        info!("Simulator listening on {}", addr);
        Ok(addr)
    }

    /// Stop accepting requests.
    ///
    /// Requests already being answered are allowed to finish. Fails with every
    /// dispatch error collected since the last stop, or, when configured, with
    /// the requests that matched no route.
    pub async fn stop(&self) -> Result<(), SimulatorError> {
        let running = self.running.lock().take().ok_or(SimulatorError::NotRunning)?;

        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.accept_task.await {
            warn!("Accept loop ended abnormally: {}", e);
        }
        info!("Simulator on {} stopped", running.addr);

        let errors = self.state.errors.drain();
        if !errors.is_empty() {
            return Err(AggregateDispatchError::new(errors).into());
        }

        if self.config.fail_on_unexpected_requests {
            let unexpected = self.state.unexpected.snapshot();
            if !unexpected.is_empty() {
                return Err(UnexpectedRequests::new(unexpected).into());
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.addr)
    }

    /// Absolute URL for `path` on the running listener.
    pub fn url(&self, path: &str) -> String {
        let base = match self.local_addr() {
            Some(addr) => format!("http://{addr}"),
            None => format!("http://{}", self.config.bind_address()),
        };
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Every request received, matched or not, in arrival order.
    pub fn received_requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.snapshot()
    }

    /// Requests that matched no route.
    pub fn unexpected_requests(&self) -> Vec<RecordedRequest> {
        self.state.unexpected.snapshot()
    }

    /// Dispatch errors collected since the last stop.
    pub fn dispatch_errors(&self) -> Vec<DispatchError> {
        self.state.errors.snapshot()
    }

    pub fn clear_received_requests(&self) {
        self.state.requests.clear();
        self.state.unexpected.clear();
    }

    pub fn routes(&self) -> &RouteTable {
        &self.state.routes
    }

    /// Register a route; it takes precedence over routes registered before it.
    pub fn route(&self, verb: HttpVerb, path: impl Into<String>) -> Route {
        let route = Route::with_serializer(verb, path, self.state.serializer());
        debug!("Registered route {} {}", verb, route.path());
        self.state.routes.register(route.clone());
        route
    }

    pub fn get(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Get, path)
    }

    pub fn post(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Post, path)
    }

    pub fn put(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Put, path)
    }

    pub fn patch(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Patch, path)
    }

    pub fn head(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Head, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Delete, path)
    }

    pub fn merge(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Merge, path)
    }

    pub fn options(&self, path: impl Into<String>) -> Route {
        self.route(HttpVerb::Options, path)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown_tx.send(true);
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .field("routes", &self.state.routes.len())
            .field("received", &self.state.requests.len())
            .finish()
    }
}
