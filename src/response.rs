//! Response assembly for atomic operation requests.
//!
//! Successful requests answer 200 with an `atomic:results` envelope, or 204
//! with no body at all when nothing produced a result (removes only, or an
//! empty operation list). Failures answer with an `errors` envelope holding
//! exactly one error object; its `status` member decides the HTTP status.

use serde_json::{Map, Value, json};

use crate::document::{ATOMIC_MEDIA_TYPE, ATOMIC_RESULTS};
use crate::error::ErrorObject;

/// A rendered response: HTTP status plus an optional JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicResponse {
    status: u16,
    body: Option<Vec<u8>>,
}

impl AtomicResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The `Content-Type` to send, absent for bodyless responses.
    pub fn content_type(&self) -> Option<&'static str> {
        self.body.as_ref().map(|_| ATOMIC_MEDIA_TYPE)
    }

    /// The body parsed back into JSON, mostly useful in tests.
    pub fn json(&self) -> Option<Value> {
        self.body
            .as_ref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Encode completed per-operation results.
pub fn encode_success(results: Vec<Value>) -> AtomicResponse {
    if results.is_empty() {
        return AtomicResponse {
            status: 204,
            body: None,
        };
    }

    let entries: Vec<Value> = results
        .into_iter()
        .map(|resource| json!({ "data": resource }))
        .collect();
    let mut envelope = Map::new();
    envelope.insert(ATOMIC_RESULTS.to_string(), Value::Array(entries));

    AtomicResponse {
        status: 200,
        body: Some(Value::Object(envelope).to_string().into_bytes()),
    }
}

/// Encode a single failure, whatever tier it came from.
pub fn encode_error(error: &ErrorObject) -> AtomicResponse {
    let envelope = json!({ "errors": [error] });
    AtomicResponse {
        status: error.status_code(),
        body: Some(envelope.to_string().into_bytes()),
    }
}
