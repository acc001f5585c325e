//! Route matching: verb, path (exact or regex) and exact query constraints.

use super::verb::HttpVerb;
use crate::simulator::SimulatorError;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// Match predicate of a single route.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    verb: HttpVerb,
    path: String,
    /// Lowercased path with a trailing `/`, used for exact matching.
    normalized_path: String,
    pattern: Option<Regex>,
    query: HashMap<String, String>,
}

impl RouteMatcher {
    pub fn new(verb: HttpVerb, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            verb,
            normalized_path: normalize_path(&path),
            path,
            pattern: None,
            query: HashMap::new(),
        }
    }

    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_regex(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn query_constraints(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Treat the configured path as a case-insensitive regular expression.
    pub fn use_regex(&mut self) -> Result<(), SimulatorError> {
        let pattern = RegexBuilder::new(&self.path)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                SimulatorError::Configuration(format!(
                    "Invalid route pattern '{}': {e}",
                    self.path
                ))
            })?;
        self.pattern = Some(pattern);
        Ok(())
    }

    /// Require `key` to be present with the decoded value `value`.
    pub fn add_query_constraint(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), value.into());
    }

    /// `path` is the decoded request path, `query` the decoded query pairs.
    pub fn matches(&self, method: &str, path: &str, query: &[(String, String)]) -> bool {
        self.verb.matches(method) && self.query_matches(query) && self.path_matches(path)
    }

    fn path_matches(&self, request_path: &str) -> bool {
        match self.pattern {
            Some(ref pattern) => pattern.is_match(&with_trailing_slash(request_path)),
            None => normalize_path(request_path) == self.normalized_path,
        }
    }

    /// The request must carry exactly the constrained parameters, no more and no less.
    fn query_matches(&self, query: &[(String, String)]) -> bool {
        query.len() == self.query.len()
            && query
                .iter()
                .all(|(key, value)| self.query.get(key).is_some_and(|expected| expected == value))
    }
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Lowercase a path and make sure it ends with `/`.
pub fn normalize_path(path: &str) -> String {
    with_trailing_slash(&path.to_lowercase())
}

/// Percent-decode a URL component, replacing invalid UTF-8 lossily.
pub fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

/// Parse a query string into decoded pairs, keeping their order.
///
/// `+` decodes to a space, as in form encoding.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    let decode = |s: &str| percent_decode(&s.replace('+', " "));
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode(key), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect()
}
