//! In-memory storage with snapshot transactions.
//!
//! [`MemoryStore`] is the bundled storage backend: resources live in
//! per-type tables behind a `tokio::sync::RwLock`, server-assigned ids come
//! from per-type sequences, and the [`UnitOfWork`] implementation snapshots
//! the whole store so a rollback restores tables and sequences exactly.
//!
//! [`MemoryHandler`] pairs one [`ResourceSchema`] with a store handle and
//! implements the full [`ResourceHandler`] contract against it, including
//! existence checks for relationship targets.
//!
//! Both types are primarily meant for tests and small deployments; real
//! backends implement [`ResourceHandler`] and [`UnitOfWork`] over their own
//! storage.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{ErrorObject, HandlerError};
use crate::handler::ResourceHandler;
use crate::operation::{AttributeMap, Operation, OperationKind, RelationshipMap};
use crate::resource::Resource;
use crate::schema::ResourceSchema;

/// Transaction boundary the execution engine drives around a request.
///
/// `begin` is called once before the first operation executes, then exactly
/// one of `commit` or `rollback` after the last. Implementations that cannot
/// guarantee atomicity must fail `begin` rather than pretend.
pub trait UnitOfWork: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a transaction covering the whole request.
    fn begin(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Make every change since `begin` durable.
    fn commit(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Discard every change since `begin`.
    fn rollback(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Failures raised by [`MemoryStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `begin` was called while a transaction was already open.
    #[error("a transaction is already active on this store")]
    TransactionActive,

    /// `commit` or `rollback` was called without an open transaction.
    #[error("no transaction is active on this store")]
    NoActiveTransaction,

    /// An insert requested an id that is already taken.
    #[error("{resource_type} resource with id `{id}` already exists")]
    DuplicateId { resource_type: String, id: String },
}

/// Content for one row to insert: the client-requested id, if any, plus the
/// attribute and relationship values.
#[derive(Debug, Clone, Default)]
pub struct NewResource {
    pub id: Option<String>,
    pub attributes: AttributeMap,
    pub relationships: RelationshipMap,
}

impl NewResource {
    /// Build the row content from the primary data of an `add` operation.
    pub fn from_operation(operation: &Operation) -> Self {
        Self {
            id: operation.id.clone(),
            attributes: operation.attributes.clone(),
            relationships: operation.relationships.clone(),
        }
    }
}

/// Per-type resource tables plus the id sequences feeding them.
#[derive(Debug, Clone, Default)]
struct Tables {
    records: HashMap<String, BTreeMap<String, Resource>>,
    sequences: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct StoreState {
    live: Tables,
    snapshot: Option<Tables>,
}

/// Shared in-memory resource store.
///
/// Cloning is cheap and every clone sees the same tables, so one store can
/// back several handlers and still roll back as a unit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one resource, assigning an id from the type's sequence when
    /// the row does not request one.
    pub async fn insert(
        &self,
        resource_type: &str,
        row: NewResource,
    ) -> Result<Resource, StoreError> {
        let mut state = self.state.write().await;
        insert_row(&mut state.live, resource_type, row)
    }

    /// Insert a batch of resources, in order, all or nothing.
    ///
    /// If any row fails (for example a duplicate id, including duplicates
    /// within the batch itself) the store is left untouched.
    pub async fn insert_many(
        &self,
        resource_type: &str,
        rows: Vec<NewResource>,
    ) -> Result<Vec<Resource>, StoreError> {
        let mut state = self.state.write().await;
        let mut staged = state.live.clone();
        let mut created = Vec::with_capacity(rows.len());
        for row in rows {
            created.push(insert_row(&mut staged, resource_type, row)?);
        }
        state.live = staged;
        Ok(created)
    }

    /// Fetch a stored resource by type and id.
    pub async fn fetch(&self, resource_type: &str, id: &str) -> Option<Resource> {
        let state = self.state.read().await;
        state
            .live
            .records
            .get(resource_type)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Replace the stored copy of a resource with this one.
    pub async fn save(&self, resource: Resource) -> Resource {
        let mut state = self.state.write().await;
        state
            .live
            .records
            .entry(resource.resource_type.clone())
            .or_default()
            .insert(resource.id.clone(), resource.clone());
        resource
    }

    /// Delete one resource. Returns whether it was present.
    pub async fn delete(&self, resource_type: &str, id: &str) -> bool {
        let mut state = self.state.write().await;
        state
            .live
            .records
            .get_mut(resource_type)
            .is_some_and(|table| table.remove(id).is_some())
    }

    /// Delete a batch of resources. Returns how many were present.
    pub async fn delete_many(&self, resource_type: &str, ids: &[String]) -> usize {
        let mut state = self.state.write().await;
        let Some(table) = state.live.records.get_mut(resource_type) else {
            return 0;
        };
        ids.iter()
            .filter(|id| table.remove(id.as_str()).is_some())
            .count()
    }

    /// Number of stored resources of one type.
    pub async fn count(&self, resource_type: &str) -> usize {
        let state = self.state.read().await;
        state
            .live
            .records
            .get(resource_type)
            .map_or(0, BTreeMap::len)
    }

    /// Ids of the stored resources of one type, in lexicographic order.
    pub async fn ids(&self, resource_type: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .live
            .records
            .get(resource_type)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl UnitOfWork for MemoryStore {
    type Error = StoreError;

    fn begin(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let mut state = self.state.write().await;
            if state.snapshot.is_some() {
                return Err(StoreError::TransactionActive);
            }
            state.snapshot = Some(state.live.clone());
            Ok(())
        }
    }

    fn commit(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let mut state = self.state.write().await;
            state
                .snapshot
                .take()
                .map(|_| ())
                .ok_or(StoreError::NoActiveTransaction)
        }
    }

    fn rollback(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let mut state = self.state.write().await;
            let snapshot = state
                .snapshot
                .take()
                .ok_or(StoreError::NoActiveTransaction)?;
            state.live = snapshot;
            Ok(())
        }
    }
}

fn insert_row(
    tables: &mut Tables,
    resource_type: &str,
    row: NewResource,
) -> Result<Resource, StoreError> {
    let id = claim_id(tables, resource_type, row.id)?;
    let resource = Resource::new(resource_type, id, row.attributes, row.relationships);
    tables
        .records
        .entry(resource_type.to_string())
        .or_default()
        .insert(resource.id.clone(), resource.clone());
    Ok(resource)
}

/// Resolve the id a new row lands under.
///
/// Requested numeric ids advance the type's sequence so later
/// server-assigned ids never collide with them.
fn claim_id(
    tables: &mut Tables,
    resource_type: &str,
    requested: Option<String>,
) -> Result<String, StoreError> {
    let id = match requested {
        Some(id) => {
            if let Ok(numeric) = id.parse::<u64>() {
                let sequence = tables
                    .sequences
                    .entry(resource_type.to_string())
                    .or_insert(0);
                if *sequence < numeric {
                    *sequence = numeric;
                }
            }
            id
        }
        None => {
            let sequence = tables
                .sequences
                .entry(resource_type.to_string())
                .or_insert(0);
            *sequence += 1;
            sequence.to_string()
        }
    };

    let taken = tables
        .records
        .get(resource_type)
        .is_some_and(|table| table.contains_key(&id));
    if taken {
        return Err(StoreError::DuplicateId {
            resource_type: resource_type.to_string(),
            id,
        });
    }
    Ok(id)
}

/// [`ResourceHandler`] over a [`MemoryStore`], one instance per resource
/// type.
#[derive(Debug, Clone)]
pub struct MemoryHandler {
    schema: ResourceSchema,
    store: MemoryStore,
}

impl MemoryHandler {
    pub fn new(schema: ResourceSchema, store: MemoryStore) -> Self {
        Self { schema, store }
    }

    /// Reject the operation if any relationship identifier points at a
    /// resource that is not stored.
    async fn check_relationship_targets(&self, operation: &Operation) -> Result<(), HandlerError> {
        for (name, value) in &operation.relationships {
            // Unknown names were already rejected during schema validation.
            let Some(definition) = self.schema.relationship_definition(name) else {
                continue;
            };
            for identifier in value.identifiers() {
                let Some(id) = identifier.id.as_deref() else {
                    continue;
                };
                if self.store.fetch(&definition.target_type, id).await.is_none() {
                    let pointer = if operation.kind == OperationKind::UpdateRelationship {
                        "/data".to_string()
                    } else {
                        format!("/data/relationships/{name}")
                    };
                    return Err(HandlerError::rejected(
                        ErrorObject::related_object_does_not_exist(
                            name,
                            &definition.target_type,
                            id,
                            pointer,
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn store_failure(&self, error: StoreError) -> HandlerError {
        match error {
            StoreError::DuplicateId { resource_type, id } => {
                HandlerError::rejected(ErrorObject::duplicate_id(&resource_type, &id))
            }
            other => HandlerError::storage(other.to_string()),
        }
    }
}

#[async_trait]
impl ResourceHandler for MemoryHandler {
    fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    async fn load(&self, id: &str) -> Result<Option<Resource>, HandlerError> {
        Ok(self.store.fetch(&self.schema.resource_type, id).await)
    }

    async fn create(&self, operation: &Operation) -> Result<Resource, HandlerError> {
        self.check_relationship_targets(operation).await?;
        self.store
            .insert(
                &self.schema.resource_type,
                NewResource::from_operation(operation),
            )
            .await
            .map_err(|error| self.store_failure(error))
    }

    async fn create_many(&self, operations: &[Operation]) -> Result<Vec<Resource>, HandlerError> {
        // A later row may reference one created earlier in the same run, so
        // only relationship-free runs take the batched path.
        if operations
            .iter()
            .all(|operation| operation.relationships.is_empty())
        {
            let rows = operations.iter().map(NewResource::from_operation).collect();
            return self
                .store
                .insert_many(&self.schema.resource_type, rows)
                .await
                .map_err(|error| self.store_failure(error));
        }

        let mut created = Vec::with_capacity(operations.len());
        for operation in operations {
            created.push(self.create(operation).await?);
        }
        Ok(created)
    }

    async fn apply(
        &self,
        mut resource: Resource,
        operation: &Operation,
    ) -> Result<Resource, HandlerError> {
        self.check_relationship_targets(operation).await?;
        resource.merge(&operation.attributes, &operation.relationships);
        Ok(self.store.save(resource).await)
    }

    async fn remove(&self, resource: Resource) -> Result<(), HandlerError> {
        self.store
            .delete(&self.schema.resource_type, &resource.id)
            .await;
        Ok(())
    }

    async fn remove_many(&self, ids: &[String]) -> Result<(), HandlerError> {
        self.store
            .delete_many(&self.schema.resource_type, ids)
            .await;
        Ok(())
    }
}
