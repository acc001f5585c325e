//! HTTP verbs a route can be registered for.

use crate::simulator::SimulatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Head,
    Delete,
    Connect,
    Trace,
    Merge,
    Options,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 10] = [
        HttpVerb::Get,
        HttpVerb::Post,
        HttpVerb::Put,
        HttpVerb::Patch,
        HttpVerb::Head,
        HttpVerb::Delete,
        HttpVerb::Connect,
        HttpVerb::Trace,
        HttpVerb::Merge,
        HttpVerb::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Head => "HEAD",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Connect => "CONNECT",
            HttpVerb::Trace => "TRACE",
            HttpVerb::Merge => "MERGE",
            HttpVerb::Options => "OPTIONS",
        }
    }

    /// Case-insensitive comparison against a request method.
    pub fn matches(&self, method: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(method)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpVerb::ALL
            .into_iter()
            .find(|verb| verb.matches(s))
            .ok_or_else(|| SimulatorError::Configuration(format!("Unsupported HTTP verb '{s}'")))
    }
}
