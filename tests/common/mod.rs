//! Shared fixtures for atomic operation tests.
//!
//! Provides a small blog domain (articles, people, tags) backed by the
//! in-memory store, plus a handler wrapper that counts persistence calls so
//! batching behavior can be observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use jsonapi_atomic::error::HandlerError;
use jsonapi_atomic::handler::ResourceHandler;
use jsonapi_atomic::operation::Operation;
use jsonapi_atomic::resource::Resource;
use jsonapi_atomic::response::AtomicResponse;
use jsonapi_atomic::schema::{
    AttributeDefinition, AttributeType, RelationshipDefinition, ResourceSchema,
};
use jsonapi_atomic::server::{AtomicServer, ExecutionMode};
use jsonapi_atomic::store::{MemoryHandler, MemoryStore, NewResource};
use serde_json::{Value, json};

pub fn article_schema() -> ResourceSchema {
    ResourceSchema::new("articles")
        .attribute(AttributeDefinition::required("title", AttributeType::String))
        .attribute(AttributeDefinition::new("rating", AttributeType::Integer))
        .relationship(RelationshipDefinition::to_one("author", "people"))
        .relationship(RelationshipDefinition::to_many("tags", "tags"))
}

pub fn person_schema() -> ResourceSchema {
    ResourceSchema::new("people")
        .attribute(AttributeDefinition::required("name", AttributeType::String))
}

pub fn tag_schema() -> ResourceSchema {
    ResourceSchema::new("tags")
        .attribute(AttributeDefinition::required("label", AttributeType::String))
}

/// Route crate logs into the captured test output when `RUST_LOG` is set.
fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a server over the full blog domain plus the store backing it.
pub fn blog_server(mode: ExecutionMode) -> (AtomicServer<MemoryStore>, MemoryStore) {
    init_logs();
    let store = MemoryStore::new();
    let server = AtomicServer::builder(store.clone())
        .register_all(
            "articles",
            Arc::new(MemoryHandler::new(article_schema(), store.clone())),
        )
        .register_all(
            "people",
            Arc::new(MemoryHandler::new(person_schema(), store.clone())),
        )
        .register_all(
            "tags",
            Arc::new(MemoryHandler::new(tag_schema(), store.clone())),
        )
        .execution_mode(mode)
        .build()
        .unwrap();
    (server, store)
}

/// Insert a person row directly, returning the assigned id.
pub async fn seed_person(store: &MemoryStore, name: &str) -> String {
    let mut row = NewResource::default();
    row.attributes.insert("name".into(), json!(name));
    store.insert("people", row).await.unwrap().id
}

/// Insert an article row directly, returning the assigned id.
pub async fn seed_article(store: &MemoryStore, title: &str) -> String {
    let mut row = NewResource::default();
    row.attributes.insert("title".into(), json!(title));
    store.insert("articles", row).await.unwrap().id
}

/// Run a document through the server, panicking on configuration errors.
pub async fn process(server: &AtomicServer<MemoryStore>, document: Value) -> AtomicResponse {
    server
        .process(document.to_string().as_bytes())
        .await
        .unwrap()
}

/// The `atomic:results` entries of a success response; empty for 204.
pub fn results(response: &AtomicResponse) -> Vec<Value> {
    match response.json() {
        Some(body) => body["atomic:results"].as_array().cloned().unwrap_or_default(),
        None => Vec::new(),
    }
}

/// The single error object of a failure response.
pub fn first_error(response: &AtomicResponse) -> Value {
    let body = response.json().expect("error response carries a body");
    let errors = body["errors"].as_array().expect("errors member").clone();
    assert_eq!(errors.len(), 1, "failures report exactly one error");
    errors[0].clone()
}

/// Number of times each persistence entry point was hit.
#[derive(Debug, Default)]
pub struct CallCounts {
    create: AtomicUsize,
    create_many: AtomicUsize,
    apply: AtomicUsize,
    remove: AtomicUsize,
    remove_many: AtomicUsize,
}

impl CallCounts {
    pub fn create(&self) -> usize {
        self.create.load(Ordering::SeqCst)
    }

    pub fn create_many(&self) -> usize {
        self.create_many.load(Ordering::SeqCst)
    }

    pub fn apply(&self) -> usize {
        self.apply.load(Ordering::SeqCst)
    }

    pub fn remove(&self) -> usize {
        self.remove.load(Ordering::SeqCst)
    }

    pub fn remove_many(&self) -> usize {
        self.remove_many.load(Ordering::SeqCst)
    }
}

/// Handler wrapper that counts how often the engine hits each persistence
/// entry point before delegating to the wrapped handler.
#[derive(Debug)]
pub struct CountingHandler {
    inner: MemoryHandler,
    counts: Arc<CallCounts>,
}

impl CountingHandler {
    pub fn new(inner: MemoryHandler) -> (Self, Arc<CallCounts>) {
        let counts = Arc::new(CallCounts::default());
        let handler = Self {
            inner,
            counts: Arc::clone(&counts),
        };
        (handler, counts)
    }
}

#[async_trait]
impl ResourceHandler for CountingHandler {
    fn schema(&self) -> &ResourceSchema {
        self.inner.schema()
    }

    async fn load(&self, id: &str) -> Result<Option<Resource>, HandlerError> {
        self.inner.load(id).await
    }

    async fn create(&self, operation: &Operation) -> Result<Resource, HandlerError> {
        self.counts.create.fetch_add(1, Ordering::SeqCst);
        self.inner.create(operation).await
    }

    async fn create_many(&self, operations: &[Operation]) -> Result<Vec<Resource>, HandlerError> {
        self.counts.create_many.fetch_add(1, Ordering::SeqCst);
        self.inner.create_many(operations).await
    }

    async fn apply(
        &self,
        resource: Resource,
        operation: &Operation,
    ) -> Result<Resource, HandlerError> {
        self.counts.apply.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(resource, operation).await
    }

    async fn remove(&self, resource: Resource) -> Result<(), HandlerError> {
        self.counts.remove.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(resource).await
    }

    async fn remove_many(&self, ids: &[String]) -> Result<(), HandlerError> {
        self.counts.remove_many.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_many(ids).await
    }
}

/// Build a server over the blog domain whose article handler counts calls.
pub fn counting_server(
    mode: ExecutionMode,
) -> (AtomicServer<MemoryStore>, MemoryStore, Arc<CallCounts>) {
    init_logs();
    let store = MemoryStore::new();
    let (articles, counts) =
        CountingHandler::new(MemoryHandler::new(article_schema(), store.clone()));
    let server = AtomicServer::builder(store.clone())
        .register_all("articles", Arc::new(articles))
        .register_all(
            "people",
            Arc::new(MemoryHandler::new(person_schema(), store.clone())),
        )
        .execution_mode(mode)
        .build()
        .unwrap();
    (server, store, counts)
}
