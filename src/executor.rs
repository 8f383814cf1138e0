//! Operation execution inside one unit of work.
//!
//! The engine runs validated operations strictly in document order: later
//! operations may rely on the side effects of earlier ones. Any failure
//! rolls the whole request back, including operations that individually
//! succeeded earlier in the list.
//!
//! Grouped mode batches consecutive runs of same-type adds and removes into
//! bulk handler calls. Batching only changes call granularity; the result
//! list keeps the exact order sequential mode would produce.

use log::{debug, error};
use serde_json::Value;

use crate::error::{AtomicError, ErrorObject, HandlerError};
use crate::handler::ResourceHandler;
use crate::operation::{Operation, OperationKind};
use crate::resource::Resource;
use crate::schema::ValidationMode;
use crate::server::{AtomicServer, ExecutionMode};
use crate::store::UnitOfWork;

/// Per-request execution state: the correlation id plus the accumulated
/// per-operation results.
#[derive(Debug)]
struct ExecutionContext {
    request_id: String,
    results: Vec<Value>,
}

impl ExecutionContext {
    fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            results: Vec::new(),
        }
    }
}

impl<U: UnitOfWork> AtomicServer<U> {
    /// Execute normalized operations inside one transaction.
    ///
    /// Returns the serialized resource representations in document order;
    /// removes contribute no entry. On any failure the unit of work is
    /// rolled back and the first error is returned. `request_id` is the
    /// correlation id carried through log output.
    pub async fn execute(
        &self,
        operations: &[Operation],
        request_id: &str,
    ) -> Result<Vec<Value>, AtomicError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        self.unit_of_work.begin().await.map_err(|err| {
            AtomicError::internal(format!("failed to open transaction: {err}"))
        })?;
        debug!(
            "Opened transaction for {} operation(s) (request: '{request_id}')",
            operations.len()
        );

        let mut context = ExecutionContext::new(request_id);
        let outcome = match self.mode {
            ExecutionMode::Sequential => self.run_sequential(operations, &mut context).await,
            ExecutionMode::Grouped => self.run_grouped(operations, &mut context).await,
        };

        match outcome {
            Ok(()) => {
                self.unit_of_work.commit().await.map_err(|err| {
                    AtomicError::internal(format!("failed to commit transaction: {err}"))
                })?;
                debug!(
                    "Committed {} operation(s) (request: '{request_id}')",
                    operations.len()
                );
                Ok(context.results)
            }
            Err(failure) => {
                debug!("Rolling back after failure: {failure} (request: '{request_id}')");
                if let Err(rollback_error) = self.unit_of_work.rollback().await {
                    // The original failure stays authoritative; the broken
                    // rollback is only logged.
                    error!("Rollback failed: {rollback_error} (request: '{request_id}')");
                }
                Err(failure)
            }
        }
    }

    async fn run_sequential(
        &self,
        operations: &[Operation],
        context: &mut ExecutionContext,
    ) -> Result<(), AtomicError> {
        for (index, operation) in operations.iter().enumerate() {
            self.apply_one(index, operation, context).await?;
        }
        Ok(())
    }

    async fn run_grouped(
        &self,
        operations: &[Operation],
        context: &mut ExecutionContext,
    ) -> Result<(), AtomicError> {
        let mut start = 0;
        while start < operations.len() {
            let mut end = start + 1;
            while end < operations.len() && operations[start].same_run(&operations[end]) {
                end += 1;
            }
            let run = &operations[start..end];
            match run[0].kind {
                OperationKind::Add => self.add_run(start, run, context).await?,
                OperationKind::Remove => self.remove_run(start, run, context).await?,
                // A batch update cannot assume a uniform set of changed
                // fields across instances, so updates run one at a time.
                OperationKind::Update | OperationKind::UpdateRelationship => {
                    for (offset, operation) in run.iter().enumerate() {
                        self.apply_one(start + offset, operation, context).await?;
                    }
                }
            }
            start = end;
        }
        Ok(())
    }

    async fn apply_one(
        &self,
        index: usize,
        operation: &Operation,
        context: &mut ExecutionContext,
    ) -> Result<(), AtomicError> {
        let handler = self
            .registry
            .resolve(operation.kind, &operation.resource_type)?;

        match operation.kind {
            OperationKind::Add => {
                schema_check(handler.as_ref(), index, operation, ValidationMode::Full)?;
                let resource = handler
                    .create(operation)
                    .await
                    .map_err(|err| handler_failure(index, err))?;
                debug!(
                    "Created {} `{}` (request: '{}')",
                    operation.resource_type, resource.id, context.request_id
                );
                context.results.push(handler.serialize(&resource));
            }
            OperationKind::Update | OperationKind::UpdateRelationship => {
                let target = load_target(handler.as_ref(), index, operation).await?;
                schema_check(handler.as_ref(), index, operation, ValidationMode::Partial)?;
                let resource = handler
                    .apply(target, operation)
                    .await
                    .map_err(|err| handler_failure(index, err))?;
                debug!(
                    "Updated {} `{}` (request: '{}')",
                    operation.resource_type, resource.id, context.request_id
                );
                context.results.push(handler.serialize(&resource));
            }
            OperationKind::Remove => {
                let target = load_target(handler.as_ref(), index, operation).await?;
                let id = target.id.clone();
                handler
                    .remove(target)
                    .await
                    .map_err(|err| handler_failure(index, err))?;
                debug!(
                    "Removed {} `{}` (request: '{}')",
                    operation.resource_type, id, context.request_id
                );
            }
        }
        Ok(())
    }

    /// Validate then persist a run of adds through one bulk-create call.
    async fn add_run(
        &self,
        start: usize,
        run: &[Operation],
        context: &mut ExecutionContext,
    ) -> Result<(), AtomicError> {
        let handler = self
            .registry
            .resolve(OperationKind::Add, &run[0].resource_type)?;
        for (offset, operation) in run.iter().enumerate() {
            schema_check(handler.as_ref(), start + offset, operation, ValidationMode::Full)?;
        }

        let resources = handler
            .create_many(run)
            .await
            // A bulk failure cannot name the exact row; it is attributed to
            // the run's first operation.
            .map_err(|err| handler_failure(start, err))?;
        debug!(
            "Created {} {} resource(s) in one batch (request: '{}')",
            resources.len(),
            run[0].resource_type,
            context.request_id
        );

        for resource in &resources {
            context.results.push(handler.serialize(resource));
        }
        Ok(())
    }

    /// Load every target of a run of removes, then delete them through one
    /// bulk-delete call.
    async fn remove_run(
        &self,
        start: usize,
        run: &[Operation],
        context: &mut ExecutionContext,
    ) -> Result<(), AtomicError> {
        let handler = self
            .registry
            .resolve(OperationKind::Remove, &run[0].resource_type)?;

        let mut ids = Vec::with_capacity(run.len());
        for (offset, operation) in run.iter().enumerate() {
            let target = load_target(handler.as_ref(), start + offset, operation).await?;
            ids.push(target.id);
        }

        handler
            .remove_many(&ids)
            .await
            .map_err(|err| handler_failure(start, err))?;
        debug!(
            "Removed {} {} resource(s) in one batch (request: '{}')",
            ids.len(),
            run[0].resource_type,
            context.request_id
        );
        Ok(())
    }
}

/// Load the resource an update or remove addresses, in a domain error when
/// it is not stored.
async fn load_target(
    handler: &dyn ResourceHandler,
    index: usize,
    operation: &Operation,
) -> Result<Resource, AtomicError> {
    let Some(id) = operation.id.as_deref() else {
        // Normalization guarantees an id for updates and removes.
        return Err(AtomicError::internal(format!(
            "operation {index} carries no target id"
        )));
    };
    match handler.load(id).await {
        Ok(Some(resource)) => Ok(resource),
        Ok(None) => Err(AtomicError::object_does_not_exist(index, id)),
        Err(err) => Err(handler_failure(index, err)),
    }
}

/// Check the operation's data against the handler's schema. Only the first
/// violation is reported.
fn schema_check(
    handler: &dyn ResourceHandler,
    index: usize,
    operation: &Operation,
    mode: ValidationMode,
) -> Result<(), AtomicError> {
    handler.validate(operation, mode).map_err(|errors| {
        let first = errors
            .into_iter()
            .next()
            .unwrap_or_else(ErrorObject::internal_error);
        AtomicError::Rejected {
            index,
            error: first.at_operation(index),
        }
    })
}

/// Map a handler failure onto the engine error for the operation at `index`,
/// rebasing rejection pointers onto the document.
fn handler_failure(index: usize, error: HandlerError) -> AtomicError {
    match error {
        HandlerError::Rejected(object) => AtomicError::Rejected {
            index,
            error: object.at_operation(index),
        },
        HandlerError::Storage { message } => AtomicError::internal(message),
    }
}
