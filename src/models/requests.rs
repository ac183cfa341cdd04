//! Request models
//!
//! Transport-independent view of an inbound request, and the `extra`
//! argument handed to logic-file transforms.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// An inbound request as the resolver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    /// Original method string, not yet validated
    pub method: String,
    /// Path and query as received, e.g. `/users?id=1`
    pub url: String,
    /// Path without query or fragment
    pub path: String,
    /// Decoded query parameters; later duplicates win
    pub query: BTreeMap<String, String>,
    /// Parsed body: JSON when possible, a string otherwise, null when empty
    pub body: Value,
}

impl MockRequest {
    /// Creates a request from a method and a `path?query` URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = match url.split_once('?') {
            Some((path, raw)) => {
                let raw = raw.split('#').next().unwrap_or_default();
                (path.to_string(), parse_query(raw))
            }
            None => (
                url.split('#').next().unwrap_or_default().to_string(),
                BTreeMap::new(),
            ),
        };

        Self {
            method: method.into(),
            url,
            path,
            query,
            body: Value::Null,
        }
    }

    /// Attaches a raw body.
    pub fn with_body_bytes(mut self, bytes: &[u8]) -> Self {
        self.body = parse_body(bytes);
        self
    }
}

fn parse_query(raw: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
        return json;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Null,
    }
}

/// Second argument of a logic-file `convert(data, extra)`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestExtra {
    pub url: String,
    pub method: String,
    pub path: String,
    /// Wildcard captures keyed by position ("0", "1", ...)
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Value,
}

impl RequestExtra {
    pub fn new(request: &MockRequest, method: &str, params: &[String]) -> Self {
        Self {
            url: request.url.clone(),
            method: method.to_string(),
            path: request.path.clone(),
            params: params
                .iter()
                .enumerate()
                .map(|(i, p)| (i.to_string(), p.clone()))
                .collect(),
            query: request.query.clone(),
            body: request.body.clone(),
        }
    }
}
