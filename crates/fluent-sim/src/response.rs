//! Response definitions.
//!
//! A [`ResponseDefinition`] is one canned answer a route can emit: a list of
//! modifiers (status, headers, cookies) applied to the outgoing response, a
//! body source and an optional "abort the connection" flag.

use crate::request::RecordedRequest;
use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, SET_COOKIE};
use hyper::{Response, StatusCode};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Body generator invoked with the request being answered.
pub type Handler = Arc<dyn Fn(&RecordedRequest) -> anyhow::Result<String> + Send + Sync>;

/// Cookie set on a response through `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            http_only: false,
            secure: false,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Lifetime in seconds.
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(ref path) = self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(ref domain) = self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Side effect applied to the outgoing response before the body is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseModifier {
    Status(u16),
    Header(String, String),
    Cookie(Cookie),
}

impl ResponseModifier {
    fn apply(&self, response: &mut Response<Full<Bytes>>) -> anyhow::Result<()> {
        match self {
            ResponseModifier::Status(code) => {
                *response.status_mut() = StatusCode::from_u16(*code)
                    .with_context(|| format!("Invalid status code {code}"))?;
            }
            ResponseModifier::Header(name, value) => {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("Invalid header name '{name}'"))?;
                let value = HeaderValue::from_str(value)
                    .with_context(|| format!("Invalid value for header '{name}'"))?;
                response.headers_mut().append(name, value);
            }
            ResponseModifier::Cookie(cookie) => {
                let value = HeaderValue::from_str(&cookie.to_string())
                    .with_context(|| format!("Invalid cookie '{}'", cookie.name))?;
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        Ok(())
    }
}

/// Where the body of a response comes from, resolved at emission time.
pub(crate) enum Payload<'a> {
    Binary(&'a Bytes),
    Computed(&'a Handler),
    Text(&'a str),
}

/// One canned answer of a route.
#[derive(Clone, Default)]
pub struct ResponseDefinition {
    text: String,
    binary: Option<Bytes>,
    handler: Option<Handler>,
    modifiers: Vec<ResponseModifier>,
    abort_immediately: bool,
    description: Vec<String>,
}

impl ResponseDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.describe(format!("body {text:?}"));
        self.text = text;
    }

    pub(crate) fn set_binary(&mut self, bytes: Bytes) {
        self.describe(format!("{} binary bytes", bytes.len()));
        self.binary = Some(bytes);
    }

    pub(crate) fn set_handler(&mut self, handler: Handler) {
        self.describe("handler body".to_string());
        self.handler = Some(handler);
    }

    pub(crate) fn push_modifier(&mut self, modifier: ResponseModifier) {
        self.describe(match &modifier {
            ResponseModifier::Status(code) => format!("status {code}"),
            ResponseModifier::Header(name, value) => format!("header {name}: {value}"),
            ResponseModifier::Cookie(cookie) => format!("cookie {}", cookie.name),
        });
        self.modifiers.push(modifier);
    }

    pub(crate) fn set_abort(&mut self) {
        self.describe("abort".to_string());
        self.abort_immediately = true;
    }

    fn describe(&mut self, part: String) {
        self.description.push(part);
    }

    pub fn modifiers(&self) -> &[ResponseModifier] {
        &self.modifiers
    }

    /// Status code this definition sets, if any (the last status modifier wins).
    pub fn status_code(&self) -> Option<u16> {
        self.modifiers.iter().rev().find_map(|m| match m {
            ResponseModifier::Status(code) => Some(*code),
            _ => None,
        })
    }

    pub fn aborts_immediately(&self) -> bool {
        self.abort_immediately
    }

    /// Binary beats text; a handler beats literal text.
    pub(crate) fn payload(&self) -> Payload<'_> {
        if let Some(ref bytes) = self.binary {
            Payload::Binary(bytes)
        } else if let Some(ref handler) = self.handler {
            Payload::Computed(handler)
        } else {
            Payload::Text(&self.text)
        }
    }

    /// Build the HTTP response for `request`: modifiers first, then the body.
    pub(crate) fn render(&self, request: &RecordedRequest) -> anyhow::Result<Response<Full<Bytes>>> {
        let mut response = Response::new(Full::new(Bytes::new()));
        for modifier in &self.modifiers {
            modifier.apply(&mut response)?;
        }

        let body = match self.payload() {
            Payload::Binary(bytes) => bytes.clone(),
            Payload::Text(text) => Bytes::from(text.to_string()),
            Payload::Computed(handler) => {
                match panic::catch_unwind(AssertUnwindSafe(|| handler(request))) {
                    Ok(result) => Bytes::from(result?),
                    Err(panic) => anyhow::bail!("Handler panicked: {}", panic_message(&*panic)),
                }
            }
        };

        *response.body_mut() = Full::new(body);
        Ok(response)
    }
}

impl fmt::Debug for ResponseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDefinition")
            .field("description", &self.description.join(", "))
            .field("modifiers", &self.modifiers.len())
            .field("abort_immediately", &self.abort_immediately)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
