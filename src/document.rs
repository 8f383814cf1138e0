//! Wire-level vocabulary of the atomic operations extension.
//!
//! Holds the envelope member names, the extension media type and the JSON
//! pointer builders used for error source reporting, plus [`RawOperation`],
//! the unvalidated view over one entry of the `atomic:operations` list.

use serde_json::Value;

/// Request envelope member holding the operation list.
pub const ATOMIC_OPERATIONS: &str = "atomic:operations";

/// Response envelope member holding the per-operation results.
pub const ATOMIC_RESULTS: &str = "atomic:results";

/// The JSON:API media type with the atomic operations extension applied.
pub const ATOMIC_MEDIA_TYPE: &str =
    "application/vnd.api+json; ext=\"https://jsonapi.org/ext/atomic\"";

/// URI identifying the atomic operations extension in `ext` parameters.
pub const ATOMIC_EXT_URI: &str = "https://jsonapi.org/ext/atomic";

/// Whether a `Content-Type` (or `Accept`) header value carries the atomic
/// operations extension.
///
/// Checks for the JSON:API base type plus an `ext` parameter containing the
/// extension URI; parameter order and quoting style are not significant.
pub fn is_atomic_media_type(header: &str) -> bool {
    let mut parts = header.split(';');
    let base = parts.next().unwrap_or_default().trim();
    if !base.eq_ignore_ascii_case("application/vnd.api+json") {
        return false;
    }
    parts.any(|parameter| {
        let Some((name, value)) = parameter.split_once('=') else {
            return false;
        };
        name.trim().eq_ignore_ascii_case("ext")
            && value.trim().trim_matches('"').split_whitespace().any(|uri| uri == ATOMIC_EXT_URI)
    })
}

/// JSON pointer builders for error source reporting.
///
/// Every validator and engine error points into the original request
/// document through one of these.
pub mod pointer {
    use super::ATOMIC_OPERATIONS;

    /// Pointer to the operation list itself.
    pub fn operations() -> String {
        format!("/{ATOMIC_OPERATIONS}")
    }

    /// Pointer to the operation object at `index`.
    pub fn operation(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}")
    }

    /// Pointer to an operation's `op` member.
    pub fn op(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/op")
    }

    /// Pointer to an operation's `href` member.
    pub fn href(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/href")
    }

    /// Pointer to an operation's `ref` member.
    pub fn reference(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/ref")
    }

    /// Pointer to an operation's `data` member.
    pub fn data(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/data")
    }

    /// Pointer to the `id` of an operation's primary data.
    pub fn data_id(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/data/id")
    }

    /// Pointer to the `attributes` object of an operation's primary data.
    pub fn data_attributes(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/data/attributes")
    }

    /// Pointer to the `relationships` object of an operation's primary data.
    pub fn data_relationships(index: usize) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/data/relationships")
    }

    /// Pointer to one named member of an operation's `relationships` object.
    pub fn data_relationship(index: usize, name: &str) -> String {
        format!("/{ATOMIC_OPERATIONS}/{index}/data/relationships/{name}")
    }
}

/// Borrowed view over one raw entry of the `atomic:operations` list.
///
/// Nothing here is validated; an absent member and an explicitly null one
/// are distinguishable (`data: null` yields `Some(&Value::Null)`), which the
/// relationship-update rules in the validator rely on.
#[derive(Debug, Clone, Copy)]
pub struct RawOperation<'a> {
    pub op: Option<&'a Value>,
    pub data: Option<&'a Value>,
    pub reference: Option<&'a Value>,
    pub href: Option<&'a Value>,
}

impl<'a> RawOperation<'a> {
    /// View an entry as an operation object; `None` if it is not an object.
    pub fn from_value(entry: &'a Value) -> Option<Self> {
        let members = entry.as_object()?;
        Some(Self {
            op: members.get("op"),
            data: members.get("data"),
            reference: members.get("ref"),
            href: members.get("href"),
        })
    }
}
