//! The server facade tying validation, dispatch and execution together.
//!
//! [`AtomicServer`] owns the handler registry and the unit of work, and
//! processes one request at a time from raw bytes to an [`AtomicResponse`].
//! Configuration follows the builder pattern; a server without a single
//! handler registration refuses to build.
//!
//! Request failures are encoded into the response envelope. Configuration
//! failures (an operation arriving for an unregistered handler pair) are
//! returned as [`ConfigError`] instead, since they indicate missing
//! deployment wiring rather than bad client input.

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AtomicError, ConfigError, ConfigResult, ErrorObject};
use crate::handler::ResourceHandler;
use crate::operation::OperationKind;
use crate::registry::HandlerRegistry;
use crate::response::{AtomicResponse, encode_error, encode_success};
use crate::store::UnitOfWork;
use crate::validator::validate_document;

/// How the engine turns an operation list into handler calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One handler call per operation, strictly in document order.
    #[default]
    Sequential,
    /// Batch consecutive same-kind, same-type runs of adds and removes into
    /// bulk handler calls. Updates always run one at a time.
    Grouped,
}

/// Server processing JSON:API atomic operation requests.
///
/// # Type Parameters
///
/// * `U` - The unit of work wrapping each request in a transaction
///
/// # Examples
///
/// ```rust
/// use jsonapi_atomic::schema::{AttributeDefinition, AttributeType, ResourceSchema};
/// use jsonapi_atomic::server::AtomicServer;
/// use jsonapi_atomic::store::{MemoryHandler, MemoryStore};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let schema = ResourceSchema::new("articles")
///     .attribute(AttributeDefinition::required("title", AttributeType::String));
/// let handler = Arc::new(MemoryHandler::new(schema, store.clone()));
///
/// let server = AtomicServer::builder(store)
///     .register_all("articles", handler)
///     .build()?;
///
/// let body = br#"{"atomic:operations": [
///     {"op": "add", "data": {"type": "articles", "attributes": {"title": "Hello"}}}
/// ]}"#;
/// let response = server.process(body).await?;
/// assert_eq!(response.status(), 200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AtomicServer<U> {
    pub(crate) registry: HandlerRegistry,
    pub(crate) unit_of_work: U,
    pub(crate) mode: ExecutionMode,
}

impl<U: UnitOfWork> AtomicServer<U> {
    /// Start building a server around the given unit of work.
    pub fn builder(unit_of_work: U) -> AtomicServerBuilder<U> {
        AtomicServerBuilder::new(unit_of_work)
    }

    /// Process a raw request body.
    ///
    /// An unparseable body answers 400 without touching any handler.
    pub async fn process(&self, body: &[u8]) -> ConfigResult<AtomicResponse> {
        match serde_json::from_slice::<Value>(body) {
            Ok(document) => self.process_document(&document).await,
            Err(error) => {
                debug!("Request body is not parseable JSON: {error}");
                Ok(encode_error(&ErrorObject::invalid_json(error)))
            }
        }
    }

    /// Process an already parsed request document.
    pub async fn process_document(&self, document: &Value) -> ConfigResult<AtomicResponse> {
        let request_id = Uuid::new_v4().to_string();
        info!("Processing atomic operation request (request: '{request_id}')");

        let operations = match validate_document(document) {
            Ok(operations) => operations,
            Err(error) => {
                warn!("Request document rejected: {error} (request: '{request_id}')");
                return Ok(encode_error(&error));
            }
        };

        match self.execute(&operations, &request_id).await {
            Ok(results) => {
                info!(
                    "Request completed with {} result(s) (request: '{request_id}')",
                    results.len()
                );
                Ok(encode_success(results))
            }
            Err(AtomicError::Config(error)) => {
                error!("Cannot serve request: {error} (request: '{request_id}')");
                Err(error)
            }
            Err(error) => {
                warn!("Request aborted: {error} (request: '{request_id}')");
                Ok(encode_error(&error.error_object()))
            }
        }
    }

    /// The configured execution mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Get a reference to the underlying unit of work.
    pub fn unit_of_work(&self) -> &U {
        &self.unit_of_work
    }
}

/// Builder assembling an [`AtomicServer`] from handler registrations.
pub struct AtomicServerBuilder<U> {
    registry: HandlerRegistry,
    unit_of_work: U,
    mode: ExecutionMode,
}

impl<U: UnitOfWork> AtomicServerBuilder<U> {
    pub fn new(unit_of_work: U) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            unit_of_work,
            mode: ExecutionMode::default(),
        }
    }

    /// Register a handler for one `(kind, type)` pair.
    pub fn register(
        mut self,
        kind: OperationKind,
        resource_type: &str,
        handler: Arc<dyn ResourceHandler>,
    ) -> Self {
        self.registry.register(kind, resource_type, handler);
        self
    }

    /// Register the same handler for `add`, `update` and `remove` on one
    /// resource type.
    pub fn register_all(mut self, resource_type: &str, handler: Arc<dyn ResourceHandler>) -> Self {
        self.registry.register_all(resource_type, handler);
        self
    }

    /// Select how operations are grouped into handler calls.
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Finish the build.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHandlers`] if nothing was registered.
    pub fn build(self) -> ConfigResult<AtomicServer<U>> {
        if self.registry.is_empty() {
            return Err(ConfigError::NoHandlers);
        }
        info!(
            "Atomic operations server configured with {} handler registration(s)",
            self.registry.len()
        );
        Ok(AtomicServer {
            registry: self.registry,
            unit_of_work: self.unit_of_work,
            mode: self.mode,
        })
    }
}
