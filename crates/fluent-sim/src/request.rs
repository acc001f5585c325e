//! Recorded requests.
//!
//! A [`RecordedRequest`] is an immutable snapshot of one inbound HTTP request.
//! It is created once per request by the dispatcher and then shared by the
//! global journal and, when a route matched, by that route's history.

use crate::route::matcher::{parse_query_string, percent_decode};
use crate::serializer::{self, BodySerializer};
use crate::simulator::SimulatorError;
use chrono::{DateTime, Utc};
use hyper::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, HOST, USER_AGENT};
use hyper::http::request::Parts;
use hyper::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// A cookie sent by the client in the `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestCookie {
    pub name: String,
    pub value: String,
}

/// Snapshot of a request received by the simulator.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    pub method: String,
    /// Absolute URL, rebuilt from the `Host` header (or the listener address).
    pub url: String,
    /// Path and query exactly as sent on the request line.
    pub raw_url: String,
    /// Percent-decoded path.
    pub path: String,
    pub query_string: String,
    /// Decoded query parameters in the order they appeared.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<RequestCookie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub accept_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub user_languages: Vec<String>,
    pub body: String,
    pub request_from: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip)]
    serializer: Option<Arc<dyn BodySerializer>>,
}

impl RecordedRequest {
    /// Build a snapshot from hyper request parts and the collected body.
    pub(crate) fn from_parts(
        parts: &Parts,
        body: &[u8],
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        received_at: DateTime<Utc>,
        serializer: Option<Arc<dyn BodySerializer>>,
    ) -> Self {
        let uri = &parts.uri;
        let headers = &parts.headers;
        let raw_url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        let query_string = uri.query().unwrap_or("").to_string();

        let host = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| header_value(headers, HOST.as_str()))
            .unwrap_or_else(|| local_addr.to_string());

        Self {
            method: parts.method.as_str().to_string(),
            url: format!("http://{host}{raw_url}"),
            raw_url,
            path: percent_decode(uri.path()),
            query: parse_query_string(&query_string),
            query_string,
            headers: headers
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            cookies: parse_cookies(headers),
            content_type: header_value(headers, CONTENT_TYPE.as_str()),
            accept_types: split_list(headers, ACCEPT.as_str()),
            user_agent: header_value(headers, USER_AGENT.as_str()),
            user_languages: split_list(headers, ACCEPT_LANGUAGE.as_str()),
            body: String::from_utf8_lossy(body).into_owned(),
            request_from: remote_addr.to_string(),
            received_at,
            serializer,
        }
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Deserialize the body with the simulator's serializer.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, SimulatorError> {
        serializer::from_text(self.serializer.as_ref(), &self.body)
    }
}

impl fmt::Debug for RecordedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordedRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Split comma separated header values (`Accept`, `Accept-Language`).
fn split_list(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .flat_map(|v| {
            String::from_utf8_lossy(v.as_bytes())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn parse_cookies(headers: &HeaderMap) -> Vec<RequestCookie> {
    headers
        .get_all(COOKIE)
        .iter()
        .flat_map(|v| {
            String::from_utf8_lossy(v.as_bytes())
                .split(';')
                .filter_map(|pair| {
                    let (name, value) = pair.trim().split_once('=')?;
                    Some(RequestCookie {
                        name: name.trim().to_string(),
                        value: value.trim().to_string(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
