//! JSON:API atomic operations server library for Rust.
//!
//! Implements the `atomic` extension of JSON:API: an ordered list of
//! heterogeneous add, update, and remove operations travels in a single
//! request document, is validated fail-fast, and is applied all-or-nothing
//! inside one unit of work. The response carries one result entry per
//! operation, or a single error object when anything failed.
//!
//! # Core Components
//!
//! - [`AtomicServer`] - Request facade wiring validation, execution, and encoding
//! - [`ResourceHandler`] - Trait for implementing per-type persistence
//! - [`UnitOfWork`] - Trait for transaction control over a storage backend
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jsonapi_atomic::schema::{AttributeDefinition, AttributeType, ResourceSchema};
//! use jsonapi_atomic::store::{MemoryHandler, MemoryStore};
//! use jsonapi_atomic::AtomicServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let schema = ResourceSchema::new("articles")
//!     .attribute(AttributeDefinition::required("title", AttributeType::String));
//! let handler = Arc::new(MemoryHandler::new(schema, store.clone()));
//!
//! let server = AtomicServer::builder(store)
//!     .register_all("articles", handler)
//!     .build()?;
//!
//! let response = server.process(br#"{"atomic:operations": []}"#).await?;
//! assert_eq!(response.status(), 204);
//! # Ok(())
//! # }
//! ```
//!
//! The wire format follows the published
//! [Atomic Operations extension](https://jsonapi.org/ext/atomic/).

pub mod document;
pub mod error;
mod executor;
pub mod handler;
pub mod operation;
pub mod registry;
pub mod resource;
pub mod response;
pub mod schema;
pub mod server;
pub mod store;
pub mod validator;

// Re-export commonly used types for convenience
pub use error::{AtomicError, ConfigError, ErrorObject, HandlerError};
pub use handler::ResourceHandler;
pub use operation::{Operation, OperationKind, RelationshipValue, ResourceIdentifier};
pub use registry::HandlerRegistry;
pub use resource::Resource;
pub use response::AtomicResponse;
pub use schema::{ResourceSchema, ValidationMode};
pub use server::{AtomicServer, AtomicServerBuilder, ExecutionMode};
pub use store::{MemoryHandler, MemoryStore, UnitOfWork};
pub use validator::validate_document;

// Wire-level names HTTP integrations need for content negotiation
pub use document::{ATOMIC_MEDIA_TYPE, is_atomic_media_type};
