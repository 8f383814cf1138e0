//! Error types for atomic operation processing.
//!
//! Errors fall into two request-level tiers: document errors (malformed
//! request bodies, rejected by the validator before any mutation) and domain
//! errors (valid documents addressing missing resources or failing handler
//! validation). Both encode into the JSON:API `errors` envelope. A third
//! tier, [`ConfigError`], signals missing handler wiring and is deliberately
//! kept out of the envelope path.

use serde::{Deserialize, Serialize};

use crate::document::pointer;
use crate::operation::OperationKind;

/// JSON pointer location of an error within the original request document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    pub pointer: String,
}

/// A JSON:API error object as it appears in the `errors` envelope.
///
/// `id` is a stable machine-readable code, `detail` the human-readable
/// explanation, `source.pointer` the exact location in the request document
/// and `status` the HTTP status code as a string, matching the JSON:API
/// error object shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub id: String,
    pub detail: String,
    pub source: ErrorSource,
    pub status: String,
}

impl ErrorObject {
    /// Create an error object from its four members.
    pub fn new(
        id: impl Into<String>,
        detail: impl Into<String>,
        pointer: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            id: id.into(),
            detail: detail.into(),
            source: ErrorSource {
                pointer: pointer.into(),
            },
            status: status.to_string(),
        }
    }

    /// The `status` member parsed back into a numeric HTTP status.
    ///
    /// Falls back to 500 if the string does not parse, so a malformed
    /// handler-supplied status can never produce a nonsense response code.
    pub fn status_code(&self) -> u16 {
        self.status.parse().unwrap_or(500)
    }

    /// Rebase a pointer that is relative to one operation object onto the
    /// full document, prefixing it with `/atomic:operations/{index}`.
    pub fn at_operation(mut self, index: usize) -> Self {
        self.source.pointer = format!("{}{}", pointer::operation(index), self.source.pointer);
        self
    }

    // Document errors (HTTP 400), emitted by the validator.

    /// The request document has no `atomic:operations` member.
    pub fn missing_operation_objects() -> Self {
        Self::new(
            "missing-operation-objects",
            "Received document does not contain operations objects",
            pointer::operations(),
            400,
        )
    }

    /// The `atomic:operations` member is not an array.
    pub fn invalid_operation_objects() -> Self {
        Self::new(
            "invalid-operation-objects",
            "Received operation objects is not a valid JSON:API atomic operation request",
            pointer::operations(),
            400,
        )
    }

    /// A list entry is not a JSON object.
    pub fn invalid_operation_object(index: usize) -> Self {
        Self::new(
            "invalid-operation-object",
            format!("Received operation with index {index} is not a valid JSON:API operation object"),
            pointer::operation(index),
            400,
        )
    }

    /// The `op` member is absent, null or empty.
    pub fn missing_operation_code(index: usize) -> Self {
        Self::new(
            "missing-operation-code",
            "Received operation does not provide an operation code",
            pointer::op(index),
            400,
        )
    }

    /// The `op` member is not one of the supported operation codes.
    pub fn unknown_operation_code(index: usize, code: impl std::fmt::Display) -> Self {
        Self::new(
            "unknown-operation-code",
            format!("Unknown operation `{code}` received"),
            pointer::op(index),
            400,
        )
    }

    /// An operation uses `href` addressing, which this layer rejects.
    pub fn href_not_implemented(index: usize) -> Self {
        Self::new(
            "not-implemented",
            "Received operation using `href` to reference objects, which is not implemented by this API. Use `ref` instead.",
            pointer::href(index),
            400,
        )
    }

    /// A `remove` operation carries both `ref` and `href`.
    pub fn ref_href_together(index: usize) -> Self {
        Self::new(
            "ref-href-together",
            format!("Using `ref` and `href` together on the operation with index {index} is not allowed"),
            pointer::href(index),
            400,
        )
    }

    /// A `remove` operation has no `ref` member.
    pub fn missing_ref(index: usize) -> Self {
        Self::new(
            "missing-ref-attribute",
            "`ref` must be part of remove operation",
            pointer::operation(index),
            400,
        )
    }

    /// A resource identifier object lacks its `id` member.
    pub fn missing_id(pointer: impl Into<String>) -> Self {
        Self::new(
            "missing-id",
            "The resource identifier object must contain an `id` member",
            pointer,
            400,
        )
    }

    /// A resource identifier object lacks its `type` member.
    pub fn missing_type(pointer: impl Into<String>) -> Self {
        Self::new(
            "missing-type",
            "The resource identifier object must contain a `type` member",
            pointer,
            400,
        )
    }

    /// An update addressed via `ref` does not name the relationship it touches.
    pub fn missing_relationship_naming(index: usize) -> Self {
        Self::new(
            "missing-relationship-naming",
            "relationship must be named by the `relationship` attribute",
            pointer::reference(index),
            400,
        )
    }

    /// The operation's `data` member is required but absent.
    pub fn missing_primary_data(index: usize) -> Self {
        Self::new(
            "missing-primary-data",
            "primary data must be present",
            pointer::operation(index),
            400,
        )
    }

    /// The operation's `data` member (or a nested part of it) has the wrong
    /// JSON shape. `expected` names the accepted shape, e.g. "an object".
    pub fn invalid_primary_data_type(pointer: impl Into<String>, expected: &str) -> Self {
        Self::new(
            "invalid-primary-data-type",
            format!("primary data must be {expected}"),
            pointer,
            400,
        )
    }

    /// The request body is not parseable JSON.
    pub fn invalid_json(message: impl std::fmt::Display) -> Self {
        Self::new(
            "invalid-json",
            format!("Request body is not valid JSON: {message}"),
            "/",
            400,
        )
    }

    // Domain errors, emitted during execution.

    /// An `update` or `remove` target was not found (HTTP 422).
    pub fn object_does_not_exist(index: usize, id: &str) -> Self {
        Self::new(
            "object-does-not-exist",
            format!("Object with id `{id}` received for operation with index `{index}` does not exist"),
            pointer::data_id(index),
            422,
        )
    }

    /// Catch-all for infrastructure failures; carries no request detail.
    pub fn internal_error() -> Self {
        Self::new(
            "internal-error",
            "The request could not be processed",
            "/",
            500,
        )
    }

    // Handler-level validation errors. Pointers are relative to the
    // operation object and rebased by the engine via [`Self::at_operation`].

    /// An attribute not defined by the resource schema.
    pub fn unknown_attribute(name: &str) -> Self {
        Self::new(
            "unknown-attribute",
            format!("Attribute `{name}` is not defined for this resource type"),
            format!("/data/attributes/{name}"),
            422,
        )
    }

    /// A schema-required attribute is absent.
    pub fn missing_required_attribute(name: &str) -> Self {
        Self::new(
            "missing-required-attribute",
            format!("Required attribute `{name}` is missing"),
            format!("/data/attributes/{name}"),
            422,
        )
    }

    /// An attribute value does not match its declared type.
    pub fn invalid_attribute_type(name: &str, expected: &str) -> Self {
        Self::new(
            "invalid-attribute-type",
            format!("Attribute `{name}` must be of type {expected}"),
            format!("/data/attributes/{name}"),
            422,
        )
    }

    /// A relationship not defined by the resource schema.
    pub fn unknown_relationship(name: &str, pointer: impl Into<String>) -> Self {
        Self::new(
            "unknown-relationship",
            format!("Relationship `{name}` is not defined for this resource type"),
            pointer,
            422,
        )
    }

    /// A relationship value whose shape or target type contradicts the schema.
    pub fn invalid_relationship_data(
        name: &str,
        reason: &str,
        pointer: impl Into<String>,
    ) -> Self {
        Self::new(
            "invalid-relationship-data",
            format!("Relationship `{name}` {reason}"),
            pointer,
            422,
        )
    }

    /// A relationship identifier addressing a resource that does not exist.
    pub fn related_object_does_not_exist(
        name: &str,
        target_type: &str,
        target_id: &str,
        pointer: impl Into<String>,
    ) -> Self {
        Self::new(
            "related-object-does-not-exist",
            format!(
                "Relationship `{name}` references {target_type} `{target_id}` which does not exist"
            ),
            pointer,
            422,
        )
    }

    /// An `add` supplied a client id that is already taken (HTTP 409).
    pub fn duplicate_id(resource_type: &str, id: &str) -> Self {
        Self::new(
            "duplicate-id",
            format!("A {resource_type} resource with id `{id}` already exists"),
            "/data/id",
            409,
        )
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (at {})", self.id, self.detail, self.source.pointer)
    }
}

/// Engine-level error covering everything that can abort a request.
///
/// Every variant except [`AtomicError::Config`] maps onto a wire error object
/// via [`AtomicError::error_object`]; configuration errors propagate out of
/// the request pipeline instead of being encoded.
#[derive(Debug, thiserror::Error)]
pub enum AtomicError {
    /// The request document failed structural validation.
    #[error("invalid operation document: {0}")]
    Document(ErrorObject),

    /// An `update` or `remove` addressed a resource that does not exist.
    #[error("object `{id}` addressed by operation {index} does not exist")]
    ObjectDoesNotExist { index: usize, id: String },

    /// A handler rejected the operation's data.
    #[error("operation {index} rejected: {error}")]
    Rejected { index: usize, error: ErrorObject },

    /// Storage or transaction failure outside the client's control.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// Missing handler wiring; indicates deployment misconfiguration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AtomicError {
    /// Create an internal error from any displayable cause.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a missing-target error for the operation at `index`.
    pub fn object_does_not_exist(index: usize, id: impl Into<String>) -> Self {
        Self::ObjectDoesNotExist {
            index,
            id: id.into(),
        }
    }

    /// The wire error object this failure encodes to.
    pub fn error_object(&self) -> ErrorObject {
        match self {
            Self::Document(error) => error.clone(),
            Self::ObjectDoesNotExist { index, id } => {
                ErrorObject::object_does_not_exist(*index, id)
            }
            Self::Rejected { error, .. } => error.clone(),
            Self::Internal { .. } | Self::Config(_) => ErrorObject::internal_error(),
        }
    }

    /// The HTTP status of the response this failure produces.
    pub fn status(&self) -> u16 {
        match self {
            Self::Document(error) => error.status_code(),
            Self::ObjectDoesNotExist { .. } => 422,
            Self::Rejected { error, .. } => error.status_code(),
            Self::Internal { .. } | Self::Config(_) => 500,
        }
    }
}

/// Fatal wiring errors raised when the registry cannot satisfy a lookup.
///
/// These indicate a misconfigured deployment rather than bad request input
/// and are never encoded into the `errors` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The builder finished without a single handler registration.
    #[error("no resource handlers registered; register at least one (operation, resource type) pair")]
    NoHandlers,

    /// A lookup hit an unregistered (operation, resource type) pair.
    #[error("no handler registered for operation `{operation}` on resource type `{resource_type}`")]
    MissingHandler {
        operation: OperationKind,
        resource_type: String,
    },
}

/// Failures surfaced by [`ResourceHandler`](crate::handler::ResourceHandler)
/// implementations.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The operation's data was rejected. The error object's pointer is
    /// relative to the operation object; the engine rebases it.
    #[error("operation data rejected: {0}")]
    Rejected(ErrorObject),

    /// The underlying storage failed.
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl HandlerError {
    /// Reject the operation with the given wire error.
    pub fn rejected(error: ErrorObject) -> Self {
        Self::Rejected(error)
    }

    /// Create a storage failure from any displayable cause.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

// Result type aliases for convenience
pub type AtomicResult<T> = Result<T, AtomicError>;
pub type DocumentResult<T> = Result<T, ErrorObject>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type HandlerResult<T> = Result<T, HandlerError>;
