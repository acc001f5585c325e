//! Routes: the expectations a simulator answers.
//!
//! A [`Route`] is a cheap handle onto shared route state. Configuration calls
//! edit the *current* response definition (the last one in the sequence);
//! [`Route::then`] appends a new definition and makes it current.
//!
//! ```no_run
//! # use fluent_sim::Simulator;
//! # async fn demo() -> Result<(), fluent_sim::SimulatorError> {
//! let sim = Simulator::bind("127.0.0.1:0");
//! sim.post("/orders")
//!     .with_code(400)
//!     .then()
//!     .with_code(201)
//!     .with_header("Location", "/orders/1");
//! # Ok(())
//! # }
//! ```

pub mod gate;
pub mod matcher;
pub mod sequence;
pub mod table;
pub mod verb;

pub use gate::Gate;
pub use matcher::RouteMatcher;
pub use sequence::ResponseSequence;
pub use table::RouteTable;
pub use verb::HttpVerb;

use crate::journal::Journal;
use crate::request::RecordedRequest;
use crate::response::{Cookie, Handler, ResponseDefinition, ResponseModifier};
use crate::serializer::{self, BodySerializer};
use crate::simulator::SimulatorError;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

struct RouteEntry {
    matcher: RwLock<RouteMatcher>,
    sequence: Mutex<ResponseSequence>,
    received: Journal<RecordedRequest>,
    gate: Gate,
    serializer: Option<Arc<dyn BodySerializer>>,
}

/// Handle to a registered route. Clones share the same state.
#[derive(Clone)]
pub struct Route {
    entry: Arc<RouteEntry>,
}

impl Route {
    /// A detached route. Use the `Simulator` helpers to create registered ones.
    pub fn new(verb: HttpVerb, path: impl Into<String>) -> Self {
        Self::with_serializer(verb, path, None)
    }

    pub(crate) fn with_serializer(
        verb: HttpVerb,
        path: impl Into<String>,
        serializer: Option<Arc<dyn BodySerializer>>,
    ) -> Self {
        Self {
            entry: Arc::new(RouteEntry {
                matcher: RwLock::new(RouteMatcher::new(verb, path)),
                sequence: Mutex::new(ResponseSequence::new()),
                received: Journal::new(),
                gate: Gate::new(),
                serializer,
            }),
        }
    }

    fn edit_current(&self, f: impl FnOnce(&mut ResponseDefinition)) -> &Self {
        f(self.entry.sequence.lock().current_mut());
        self
    }

    pub fn verb(&self) -> HttpVerb {
        self.entry.matcher.read().verb()
    }

    pub fn path(&self) -> String {
        self.entry.matcher.read().path().to_string()
    }

    /// Literal text body.
    pub fn responds(&self, body: impl Into<String>) -> &Self {
        let body = body.into();
        self.edit_current(|r| r.set_text(body))
    }

    /// Binary body; wins over any text or handler body.
    pub fn responds_bytes(&self, body: impl Into<Bytes>) -> &Self {
        let body = body.into();
        self.edit_current(|r| r.set_binary(body))
    }

    /// Serialize `value` with the simulator's serializer and use it as the body.
    pub fn responds_with<T: Serialize + ?Sized>(&self, value: &T) -> Result<&Self, SimulatorError> {
        let text = serializer::to_text(self.entry.serializer.as_ref(), value)?;
        Ok(self.responds(text))
    }

    /// Compute the body from the request being answered.
    pub fn handled_by<F>(&self, handler: F) -> &Self
    where
        F: Fn(&RecordedRequest) -> String + Send + Sync + 'static,
    {
        self.try_handled_by(move |request| Ok(handler(request)))
    }

    /// Like [`Route::handled_by`], but the handler may fail. A failure is
    /// answered with a 500 and reported when the simulator stops.
    pub fn try_handled_by<F>(&self, handler: F) -> &Self
    where
        F: Fn(&RecordedRequest) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.edit_current(|r| r.set_handler(handler))
    }

    pub fn with_code(&self, code: u16) -> &Self {
        self.edit_current(|r| r.push_modifier(ResponseModifier::Status(code)))
    }

    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        let modifier = ResponseModifier::Header(name.into(), value.into());
        self.edit_current(|r| r.push_modifier(modifier))
    }

    pub fn with_cookie(&self, cookie: Cookie) -> &Self {
        self.edit_current(|r| r.push_modifier(ResponseModifier::Cookie(cookie)))
    }

    /// Require the query parameter `key` with the decoded value `value`.
    pub fn with_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        self.entry.matcher.write().add_query_constraint(key, value);
        self
    }

    /// Match the path as a case-insensitive regular expression.
    pub fn matching_regex(&self) -> Result<&Self, SimulatorError> {
        self.entry.matcher.write().use_regex()?;
        Ok(self)
    }

    pub fn delay(&self, delay: Duration) -> &Self {
        self.entry.gate.set_delay(delay);
        self
    }

    pub fn pause(&self) -> &Self {
        self.entry.gate.pause();
        self
    }

    pub fn resume(&self) -> &Self {
        self.entry.gate.resume();
        self
    }

    pub fn is_paused(&self) -> bool {
        self.entry.gate.is_paused()
    }

    /// Drop the connection without writing a response.
    pub fn immediately_aborts(&self) -> &Self {
        self.edit_current(|r| r.set_abort())
    }

    /// Start a new response definition, served after the previous ones.
    pub fn then(&self) -> &Self {
        self.entry.sequence.lock().push();
        self
    }

    /// Serve the sequence from its first response again.
    pub fn reset_sequence(&self) -> &Self {
        self.entry.sequence.lock().reset();
        self
    }

    /// Number of responses in the sequence.
    pub fn response_count(&self) -> usize {
        self.entry.sequence.lock().len()
    }

    pub fn history(&self) -> RouteHistory {
        RouteHistory {
            requests: self.entry.received.snapshot(),
        }
    }

    pub fn received_requests(&self) -> Vec<RecordedRequest> {
        self.entry.received.snapshot()
    }

    pub fn ptr_eq(&self, other: &Route) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    pub(crate) fn matches(&self, method: &str, path: &str, query: &[(String, String)]) -> bool {
        self.entry.matcher.read().matches(method, path, query)
    }

    pub(crate) fn next_response(&self) -> ResponseDefinition {
        self.entry.sequence.lock().next_response()
    }

    pub(crate) fn record(&self, request: RecordedRequest) {
        self.entry.received.append(request);
    }

    pub(crate) async fn wait_until_ready(&self) {
        self.entry.gate.wait_until_ready().await;
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matcher = self.entry.matcher.read();
        f.debug_struct("Route")
            .field("verb", &matcher.verb())
            .field("path", &matcher.path())
            .field("regex", &matcher.is_regex())
            .field("query", matcher.query_constraints())
            .field("responses", &self.entry.sequence.lock().len())
            .field("paused", &self.entry.gate.is_paused())
            .finish()
    }
}

/// Requests a route has answered, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RouteHistory {
    requests: Vec<RecordedRequest>,
}

impl RouteHistory {
    pub fn received_requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn last(&self) -> Option<&RecordedRequest> {
        self.requests.last()
    }
}

impl IntoIterator for RouteHistory {
    type Item = RecordedRequest;
    type IntoIter = std::vec::IntoIter<RecordedRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}
