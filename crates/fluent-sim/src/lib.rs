//! FluentSim: an in-process mock HTTP server for tests.
//!
//! Register the routes a client is expected to call, describe what each route
//! answers, run the client against the simulator, then assert on the requests
//! the simulator recorded.
//!
//! ```no_run
//! # async fn demo() -> Result<(), fluent_sim::SimulatorError> {
//! use fluent_sim::Simulator;
//!
//! let sim = Simulator::bind("127.0.0.1:0");
//! sim.get("/test").responds("TEST");
//! sim.post("/orders").with_code(400).then().with_code(500).then().with_code(200);
//! sim.start().await?;
//!
//! // ... exercise a client against sim.url("/test") ...
//!
//! assert_eq!(sim.received_requests().len(), 0);
//! sim.stop().await?;
//! # Ok(())
//! # }
//! ```

// ===== Core dispatch engine =====
pub mod journal;
pub mod route;
pub mod simulator;

// ===== Request/response model =====
pub mod request;
pub mod response;

// ===== Ambient =====
pub mod config;
pub mod serializer;

pub use config::SimulatorConfig;
pub use request::{RecordedRequest, RequestCookie};
pub use response::{Cookie, ResponseDefinition, ResponseModifier};
pub use route::{HttpVerb, Route, RouteHistory, RouteTable};
pub use serializer::{BodySerializer, JsonSerializer, YamlSerializer};
pub use simulator::{
    AggregateDispatchError, DispatchError, Simulator, SimulatorError, UnexpectedRequests,
};
