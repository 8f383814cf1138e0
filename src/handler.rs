//! The handler contract between the execution engine and resource storage.
//!
//! A [`ResourceHandler`] serves one resource type. The engine never talks to
//! storage directly: it validates through the handler's schema, loads targets
//! before mutating them, and hands each operation over for execution. Runs of
//! consecutive same-shaped operations reach the handler through the bulk
//! entry points [`create_many`](ResourceHandler::create_many) and
//! [`remove_many`](ResourceHandler::remove_many), which fall back to the
//! one-at-a-time methods unless overridden.
//!
//! Handlers report failures as a [`HandlerError`]: either a rejection
//! carrying a ready-made error object (the engine rebases its pointer onto
//! the failing operation) or a storage fault, which surfaces as an internal
//! error.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ErrorObject, HandlerError};
use crate::operation::Operation;
use crate::resource::Resource;
use crate::schema::{ResourceSchema, ValidationMode};

/// Executes operations against the stored resources of one type.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The schema describing the resource type this handler serves.
    fn schema(&self) -> &ResourceSchema;

    /// Check an operation's data against the schema.
    ///
    /// Pointers in the returned errors are relative to the operation object;
    /// the engine rebases them onto the operation's document position.
    fn validate(
        &self,
        operation: &Operation,
        mode: ValidationMode,
    ) -> Result<(), Vec<ErrorObject>> {
        let errors = self.schema().validate(operation, mode);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Load a stored resource by id.
    async fn load(&self, id: &str) -> Result<Option<Resource>, HandlerError>;

    /// Create and persist a resource from an `add` operation.
    async fn create(&self, operation: &Operation) -> Result<Resource, HandlerError>;

    /// Create every resource in a run of `add` operations, in order.
    ///
    /// The default creates them one at a time; handlers backed by stores
    /// with bulk inserts should override it.
    async fn create_many(&self, operations: &[Operation]) -> Result<Vec<Resource>, HandlerError> {
        let mut created = Vec::with_capacity(operations.len());
        for operation in operations {
            created.push(self.create(operation).await?);
        }
        Ok(created)
    }

    /// Apply an update to a loaded resource and persist the result.
    async fn apply(
        &self,
        resource: Resource,
        operation: &Operation,
    ) -> Result<Resource, HandlerError>;

    /// Delete a loaded resource.
    async fn remove(&self, resource: Resource) -> Result<(), HandlerError>;

    /// Delete every listed resource in a run of `remove` operations.
    ///
    /// Callers load each target before batching, so by the time this runs
    /// every id named an existing resource. The default loads and removes
    /// one at a time.
    async fn remove_many(&self, ids: &[String]) -> Result<(), HandlerError> {
        for id in ids {
            if let Some(resource) = self.load(id).await? {
                self.remove(resource).await?;
            }
        }
        Ok(())
    }

    /// Render a stored resource as a JSON:API resource object.
    fn serialize(&self, resource: &Resource) -> Value {
        resource.to_resource_object(self.schema())
    }
}

impl std::fmt::Debug for dyn ResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("resource_type", &self.schema().resource_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;
    use crate::schema::{AttributeDefinition, AttributeType};
    use serde_json::json;
    use std::sync::Mutex;

    /// Minimal in-test handler over a Vec, for exercising trait defaults.
    struct Recorder {
        schema: ResourceSchema,
        rows: Mutex<Vec<Resource>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                schema: ResourceSchema::new("articles")
                    .attribute(AttributeDefinition::required("title", AttributeType::String)),
                rows: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ResourceHandler for Recorder {
        fn schema(&self) -> &ResourceSchema {
            &self.schema
        }

        async fn load(&self, id: &str) -> Result<Option<Resource>, HandlerError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|resource| resource.id == id).cloned())
        }

        async fn create(&self, operation: &Operation) -> Result<Resource, HandlerError> {
            let mut rows = self.rows.lock().unwrap();
            let resource = Resource::new(
                &operation.resource_type,
                (rows.len() + 1).to_string(),
                operation.attributes.clone(),
                operation.relationships.clone(),
            );
            rows.push(resource.clone());
            Ok(resource)
        }

        async fn apply(
            &self,
            resource: Resource,
            _operation: &Operation,
        ) -> Result<Resource, HandlerError> {
            Ok(resource)
        }

        async fn remove(&self, resource: Resource) -> Result<(), HandlerError> {
            let mut rows = self.rows.lock().unwrap();
            rows.retain(|stored| stored.id != resource.id);
            Ok(())
        }
    }

    fn add_operation(title: &str) -> Operation {
        let mut operation = Operation::new(OperationKind::Add, "articles", None);
        operation.attributes.insert("title".into(), json!(title));
        operation
    }

    #[tokio::test]
    async fn test_create_many_default_creates_in_order() {
        let handler = Recorder::new();
        let operations = vec![add_operation("a"), add_operation("b"), add_operation("c")];
        let created = handler.create_many(&operations).await.unwrap();
        let ids: Vec<&str> = created.iter().map(|resource| resource.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(created[2].attribute("title"), Some(&json!("c")));
    }

    #[tokio::test]
    async fn test_remove_many_default_removes_each() {
        let handler = Recorder::new();
        handler.create(&add_operation("a")).await.unwrap();
        handler.create(&add_operation("b")).await.unwrap();
        let ids = vec!["1".to_string(), "2".to_string()];
        handler.remove_many(&ids).await.unwrap();
        assert!(handler.load("1").await.unwrap().is_none());
        assert!(handler.load("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_default_delegates_to_schema() {
        let handler = Recorder::new();
        let mut operation = add_operation("a");
        operation.attributes.insert("surprise".into(), json!(1));
        let errors = handler
            .validate(&operation, ValidationMode::Full)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, "unknown-attribute");

        let valid = add_operation("a");
        assert!(handler.validate(&valid, ValidationMode::Full).is_ok());
    }

    #[tokio::test]
    async fn test_serialize_uses_schema() {
        let handler = Recorder::new();
        let created = handler.create(&add_operation("Ember")).await.unwrap();
        assert_eq!(
            handler.serialize(&created),
            json!({
                "type": "articles",
                "id": "1",
                "attributes": {"title": "Ember"}
            })
        );
    }
}
