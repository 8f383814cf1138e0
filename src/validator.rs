//! Document validation for atomic operation requests.
//!
//! [`validate_document`] turns a parsed request body into normalized
//! [`Operation`]s, failing fast on the first structural violation. Every
//! error carries a JSON pointer into the original document so clients can
//! map it back to the offending entry.
//!
//! Checks here are purely structural. Schema rules such as attribute types
//! and relationship cardinality are enforced by the resource handlers,
//! immediately before each mutation.

use serde_json::{Map, Value};

use crate::document::{ATOMIC_OPERATIONS, RawOperation, pointer};
use crate::error::{DocumentResult, ErrorObject};
use crate::operation::{
    AttributeMap, Operation, OperationKind, RelationshipMap, RelationshipValue, ResourceIdentifier,
};

/// Validate a request document and normalize its operations.
///
/// An empty `atomic:operations` list is valid and yields an empty operation
/// list; the caller answers it with 204.
pub fn validate_document(document: &Value) -> DocumentResult<Vec<Operation>> {
    let operations = document
        .as_object()
        .and_then(|object| object.get(ATOMIC_OPERATIONS))
        .ok_or_else(ErrorObject::missing_operation_objects)?;
    let entries = operations
        .as_array()
        .ok_or_else(ErrorObject::invalid_operation_objects)?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| validate_entry(index, entry))
        .collect()
}

fn validate_entry(index: usize, entry: &Value) -> DocumentResult<Operation> {
    let Some(raw) = RawOperation::from_value(entry) else {
        return Err(ErrorObject::invalid_operation_object(index));
    };

    let kind = operation_kind(index, &raw)?;

    // Only removes report the conflicting pair; `href` on any other
    // operation takes the generic rejection.
    if kind == OperationKind::Remove && raw.reference.is_some() && raw.href.is_some() {
        return Err(ErrorObject::ref_href_together(index));
    }
    if raw.href.is_some() {
        return Err(ErrorObject::href_not_implemented(index));
    }

    match kind {
        OperationKind::Add => validate_add(index, &raw),
        OperationKind::Update | OperationKind::UpdateRelationship => validate_update(index, &raw),
        OperationKind::Remove => validate_remove(index, &raw),
    }
}

fn operation_kind(index: usize, raw: &RawOperation) -> DocumentResult<OperationKind> {
    let code = match raw.op {
        None | Some(Value::Null) => return Err(ErrorObject::missing_operation_code(index)),
        Some(value) => value,
    };
    match code {
        Value::String(code) if code.is_empty() => Err(ErrorObject::missing_operation_code(index)),
        Value::String(code) => OperationKind::from_code(code)
            .ok_or_else(|| ErrorObject::unknown_operation_code(index, code)),
        other => Err(ErrorObject::unknown_operation_code(index, other)),
    }
}

fn validate_add(index: usize, raw: &RawOperation) -> DocumentResult<Operation> {
    let data = primary_data_object(index, raw.data)?;
    let resource_type = string_member(data, "type")
        .ok_or_else(|| ErrorObject::missing_type(pointer::data(index)))?;
    // A client-supplied id is optional, but if the member is there it has to
    // be a usable string.
    let id = match data.get("id") {
        None => None,
        Some(value) => Some(
            value
                .as_str()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ErrorObject::missing_id(pointer::data(index)))?
                .to_string(),
        ),
    };

    let mut operation = Operation::new(OperationKind::Add, resource_type, id);
    operation.attributes = collect_attributes(index, data)?;
    operation.relationships = collect_relationships(index, data)?;
    Ok(operation)
}

fn validate_update(index: usize, raw: &RawOperation) -> DocumentResult<Operation> {
    // An explicit `ref` makes this a relationship update; `ref: null` is
    // treated as absent.
    if let Some(reference) = raw.reference.filter(|value| !value.is_null()) {
        return validate_relationship_update(index, reference, raw);
    }

    let data = primary_data_object(index, raw.data)?;
    let id = string_member(data, "id")
        .ok_or_else(|| ErrorObject::missing_id(pointer::data(index)))?;
    let resource_type = string_member(data, "type")
        .ok_or_else(|| ErrorObject::missing_type(pointer::data(index)))?;

    let mut operation = Operation::new(OperationKind::Update, resource_type, Some(id.to_string()));
    operation.attributes = collect_attributes(index, data)?;
    operation.relationships = collect_relationships(index, data)?;
    Ok(operation)
}

fn validate_relationship_update(
    index: usize,
    reference: &Value,
    raw: &RawOperation,
) -> DocumentResult<Operation> {
    let reference = reference.as_object().ok_or_else(|| {
        ErrorObject::invalid_primary_data_type(pointer::reference(index), "an object")
    })?;
    let id = string_member(reference, "id")
        .ok_or_else(|| ErrorObject::missing_id(pointer::reference(index)))?;
    let resource_type = string_member(reference, "type")
        .ok_or_else(|| ErrorObject::missing_type(pointer::reference(index)))?;
    let relationship = string_member(reference, "relationship")
        .ok_or_else(|| ErrorObject::missing_relationship_naming(index))?;

    // `data: null` legitimately clears the relation, so only a genuinely
    // absent key is an error here.
    let Some(data) = raw.data else {
        return Err(ErrorObject::missing_primary_data(index));
    };
    let value = relationship_value(&pointer::data(index), data)?;

    let mut operation = Operation::new(
        OperationKind::UpdateRelationship,
        resource_type,
        Some(id.to_string()),
    );
    operation
        .relationships
        .insert(relationship.to_string(), value);
    Ok(operation)
}

fn validate_remove(index: usize, raw: &RawOperation) -> DocumentResult<Operation> {
    let reference = match raw.reference {
        None | Some(Value::Null) => return Err(ErrorObject::missing_ref(index)),
        Some(value) => value.as_object().ok_or_else(|| {
            ErrorObject::invalid_primary_data_type(pointer::reference(index), "an object")
        })?,
    };
    let id = string_member(reference, "id")
        .ok_or_else(|| ErrorObject::missing_id(pointer::reference(index)))?;
    let resource_type = string_member(reference, "type")
        .ok_or_else(|| ErrorObject::missing_type(pointer::reference(index)))?;

    Ok(Operation::new(
        OperationKind::Remove,
        resource_type,
        Some(id.to_string()),
    ))
}

/// The `data` member as an object, required for `add` and plain `update`.
fn primary_data_object<'a>(
    index: usize,
    data: Option<&'a Value>,
) -> DocumentResult<&'a Map<String, Value>> {
    match data {
        None | Some(Value::Null) => Err(ErrorObject::missing_primary_data(index)),
        Some(value) => value.as_object().ok_or_else(|| {
            ErrorObject::invalid_primary_data_type(pointer::data(index), "an object")
        }),
    }
}

fn collect_attributes(index: usize, data: &Map<String, Value>) -> DocumentResult<AttributeMap> {
    match data.get("attributes") {
        None => Ok(AttributeMap::new()),
        Some(Value::Object(attributes)) => Ok(attributes.clone()),
        Some(_) => Err(ErrorObject::invalid_primary_data_type(
            pointer::data_attributes(index),
            "an object",
        )),
    }
}

fn collect_relationships(
    index: usize,
    data: &Map<String, Value>,
) -> DocumentResult<RelationshipMap> {
    let mut relationships = RelationshipMap::new();
    let Some(raw) = data.get("relationships") else {
        return Ok(relationships);
    };
    let Some(members) = raw.as_object() else {
        return Err(ErrorObject::invalid_primary_data_type(
            pointer::data_relationships(index),
            "an object",
        ));
    };

    for (name, member) in members {
        let member_pointer = pointer::data_relationship(index, name);
        let Some(inner) = member.as_object().and_then(|object| object.get("data")) else {
            return Err(ErrorObject::invalid_primary_data_type(
                member_pointer,
                "an object containing a `data` member",
            ));
        };
        relationships.insert(name.clone(), relationship_value(&member_pointer, inner)?);
    }
    Ok(relationships)
}

/// Normalize one relationship `data` value: a resource identifier (to-one),
/// a list of identifiers (to-many) or null (clear).
fn relationship_value(pointer: &str, value: &Value) -> DocumentResult<RelationshipValue> {
    match value {
        Value::Null => Ok(RelationshipValue::Clear),
        Value::Object(object) => Ok(RelationshipValue::One(required_identifier(
            object, pointer,
        )?)),
        Value::Array(elements) => {
            let mut targets = Vec::with_capacity(elements.len());
            for element in elements {
                let Some(object) = element.as_object() else {
                    return Err(ErrorObject::invalid_primary_data_type(
                        pointer,
                        "an array of resource identifier objects",
                    ));
                };
                targets.push(required_identifier(object, pointer)?);
            }
            Ok(RelationshipValue::Many(targets))
        }
        _ => Err(ErrorObject::invalid_primary_data_type(
            pointer,
            "a resource identifier object, an array of resource identifier objects, or null",
        )),
    }
}

fn required_identifier(
    object: &Map<String, Value>,
    pointer: &str,
) -> DocumentResult<ResourceIdentifier> {
    let id = string_member(object, "id").ok_or_else(|| ErrorObject::missing_id(pointer))?;
    let resource_type =
        string_member(object, "type").ok_or_else(|| ErrorObject::missing_type(pointer))?;
    Ok(ResourceIdentifier::new(resource_type, id))
}

/// A member that must be a non-empty string to count as present.
fn string_member<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(operations: Value) -> Value {
        json!({ "atomic:operations": operations })
    }

    fn first_error(operations: Value) -> ErrorObject {
        validate_document(&document(operations)).unwrap_err()
    }

    #[test]
    fn test_missing_operation_objects() {
        for body in [json!("nope"), json!({}), json!({"operations": []})] {
            let error = validate_document(&body).unwrap_err();
            assert_eq!(error.id, "missing-operation-objects");
            assert_eq!(error.source.pointer, "/atomic:operations");
            assert_eq!(error.status_code(), 400);
        }
    }

    #[test]
    fn test_operations_member_must_be_a_list() {
        let error = first_error(json!({"op": "add"}));
        assert_eq!(error.id, "invalid-operation-objects");
    }

    #[test]
    fn test_empty_operation_list_is_valid() {
        let operations = validate_document(&document(json!([]))).unwrap();
        assert!(operations.is_empty());
    }

    #[test]
    fn test_entry_must_be_an_object() {
        let error = first_error(json!([5]));
        assert_eq!(error.id, "invalid-operation-object");
        assert_eq!(error.source.pointer, "/atomic:operations/0");
    }

    #[test]
    fn test_missing_operation_code() {
        for entry in [json!({}), json!({"op": null}), json!({"op": ""})] {
            let error = first_error(json!([entry]));
            assert_eq!(error.id, "missing-operation-code");
            assert_eq!(error.source.pointer, "/atomic:operations/0/op");
        }
    }

    #[test]
    fn test_unknown_operation_code() {
        let error = first_error(json!([{"op": "destroy"}]));
        assert_eq!(error.id, "unknown-operation-code");
        assert_eq!(error.detail, "Unknown operation `destroy` received");

        let error = first_error(json!([{"op": 5}]));
        assert_eq!(error.detail, "Unknown operation `5` received");
    }

    #[test]
    fn test_error_reports_the_failing_index() {
        let error = first_error(json!([
            {"op": "add", "data": {"type": "articles"}},
            {"op": "destroy"}
        ]));
        assert_eq!(error.source.pointer, "/atomic:operations/1/op");
    }

    #[test]
    fn test_href_is_rejected() {
        let error = first_error(json!([{"op": "add", "href": "/articles"}]));
        assert_eq!(error.id, "not-implemented");
        assert_eq!(error.source.pointer, "/atomic:operations/0/href");
    }

    #[test]
    fn test_ref_and_href_together() {
        let error = first_error(json!([{
            "op": "remove",
            "ref": {"type": "articles", "id": "1"},
            "href": "/articles/1"
        }]));
        assert_eq!(error.id, "ref-href-together");
    }

    #[test]
    fn test_ref_with_href_outside_remove() {
        // The conflicting-pair code is specific to removes; other operations
        // carrying `href` fail the generic rejection even alongside `ref`.
        for entry in [
            json!({
                "op": "update",
                "ref": {"type": "articles", "id": "13", "relationship": "author"},
                "href": "/articles/13/relationships/author",
                "data": null
            }),
            json!({
                "op": "add",
                "ref": {"type": "articles", "id": "13"},
                "href": "/articles",
                "data": {"type": "articles"}
            }),
        ] {
            let error = first_error(json!([entry]));
            assert_eq!(error.id, "not-implemented");
            assert_eq!(error.source.pointer, "/atomic:operations/0/href");
        }
    }

    #[test]
    fn test_add_requires_primary_data() {
        for entry in [json!({"op": "add"}), json!({"op": "add", "data": null})] {
            let error = first_error(json!([entry]));
            assert_eq!(error.id, "missing-primary-data");
            assert_eq!(error.source.pointer, "/atomic:operations/0");
        }
    }

    #[test]
    fn test_add_data_must_be_an_object() {
        let error = first_error(json!([{"op": "add", "data": [1, 2]}]));
        assert_eq!(error.id, "invalid-primary-data-type");
        assert_eq!(error.source.pointer, "/atomic:operations/0/data");
    }

    #[test]
    fn test_add_requires_a_type() {
        for data in [json!({}), json!({"type": ""}), json!({"type": 7})] {
            let error = first_error(json!([{"op": "add", "data": data}]));
            assert_eq!(error.id, "missing-type");
            assert_eq!(error.source.pointer, "/atomic:operations/0/data");
        }
    }

    #[test]
    fn test_add_normalizes_operation() {
        let operations = validate_document(&document(json!([{
            "op": "add",
            "data": {
                "type": "articles",
                "attributes": {"title": "JSON API paints my bikeshed!"},
                "relationships": {
                    "author": {"data": {"type": "people", "id": "9"}},
                    "tags": {"data": [{"type": "tags", "id": "2"}]},
                    "cover": {"data": null}
                }
            }
        }])))
        .unwrap();

        assert_eq!(operations.len(), 1);
        let operation = &operations[0];
        assert_eq!(operation.kind, OperationKind::Add);
        assert_eq!(operation.resource_type, "articles");
        assert_eq!(operation.id, None);
        assert_eq!(
            operation.attributes.get("title"),
            Some(&json!("JSON API paints my bikeshed!"))
        );
        assert_eq!(
            operation.relationships.get("author"),
            Some(&RelationshipValue::One(ResourceIdentifier::new(
                "people", "9"
            )))
        );
        assert_eq!(
            operation.relationships.get("tags"),
            Some(&RelationshipValue::Many(vec![ResourceIdentifier::new(
                "tags", "2"
            )]))
        );
        assert_eq!(
            operation.relationships.get("cover"),
            Some(&RelationshipValue::Clear)
        );
    }

    #[test]
    fn test_add_accepts_a_client_supplied_id() {
        let operations = validate_document(&document(json!([{
            "op": "add",
            "data": {"type": "articles", "id": "a1"}
        }])))
        .unwrap();
        assert_eq!(operations[0].id.as_deref(), Some("a1"));

        let error = first_error(json!([{"op": "add", "data": {"type": "articles", "id": 7}}]));
        assert_eq!(error.id, "missing-id");
    }

    #[test]
    fn test_add_attributes_must_be_an_object() {
        let error = first_error(json!([{
            "op": "add",
            "data": {"type": "articles", "attributes": ["nope"]}
        }]));
        assert_eq!(error.id, "invalid-primary-data-type");
        assert_eq!(error.source.pointer, "/atomic:operations/0/data/attributes");
    }

    #[test]
    fn test_relationship_member_must_wrap_data() {
        for member in [json!(5), json!({}), json!({"meta": {}})] {
            let error = first_error(json!([{
                "op": "add",
                "data": {"type": "articles", "relationships": {"author": member}}
            }]));
            assert_eq!(error.id, "invalid-primary-data-type");
            assert_eq!(
                error.source.pointer,
                "/atomic:operations/0/data/relationships/author"
            );
        }
    }

    #[test]
    fn test_relationship_identifiers_are_checked() {
        let error = first_error(json!([{
            "op": "add",
            "data": {
                "type": "articles",
                "relationships": {"author": {"data": {"type": "people"}}}
            }
        }]));
        assert_eq!(error.id, "missing-id");
        assert_eq!(
            error.source.pointer,
            "/atomic:operations/0/data/relationships/author"
        );
    }

    #[test]
    fn test_remove_requires_a_ref() {
        for entry in [
            json!({"op": "remove"}),
            json!({"op": "remove", "ref": null}),
        ] {
            let error = first_error(json!([entry]));
            assert_eq!(error.id, "missing-ref-attribute");
            assert_eq!(error.detail, "`ref` must be part of remove operation");
            assert_eq!(error.source.pointer, "/atomic:operations/0");
        }
    }

    #[test]
    fn test_remove_ref_identifier_checks() {
        let error = first_error(json!([{"op": "remove", "ref": {}}]));
        assert_eq!(error.id, "missing-id");
        assert_eq!(error.source.pointer, "/atomic:operations/0/ref");

        let error = first_error(json!([{"op": "remove", "ref": {"id": "1"}}]));
        assert_eq!(error.id, "missing-type");

        let operations = validate_document(&document(json!([{
            "op": "remove",
            "ref": {"type": "articles", "id": "13"}
        }])))
        .unwrap();
        assert_eq!(operations[0].kind, OperationKind::Remove);
        assert_eq!(operations[0].id.as_deref(), Some("13"));
    }

    #[test]
    fn test_update_requires_primary_data() {
        for entry in [
            json!({"op": "update"}),
            json!({"op": "update", "data": null}),
        ] {
            let error = first_error(json!([entry]));
            assert_eq!(error.id, "missing-primary-data");
        }
    }

    #[test]
    fn test_update_data_identifier_checks() {
        let error = first_error(json!([{"op": "update", "data": {}}]));
        assert_eq!(error.id, "missing-id");
        assert_eq!(error.source.pointer, "/atomic:operations/0/data");

        let error = first_error(json!([{"op": "update", "data": {"id": "1"}}]));
        assert_eq!(error.id, "missing-type");
    }

    #[test]
    fn test_update_normalizes_operation() {
        let operations = validate_document(&document(json!([{
            "op": "update",
            "data": {
                "type": "articles",
                "id": "13",
                "attributes": {"title": "To TDD or Not"}
            }
        }])))
        .unwrap();
        let operation = &operations[0];
        assert_eq!(operation.kind, OperationKind::Update);
        assert_eq!(operation.id.as_deref(), Some("13"));
        assert_eq!(
            operation.attributes.get("title"),
            Some(&json!("To TDD or Not"))
        );
    }

    #[test]
    fn test_ref_update_requires_relationship_name() {
        let error = first_error(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13"},
            "data": null
        }]));
        assert_eq!(error.id, "missing-relationship-naming");
        assert_eq!(
            error.detail,
            "relationship must be named by the `relationship` attribute"
        );
        assert_eq!(error.source.pointer, "/atomic:operations/0/ref");
    }

    #[test]
    fn test_relationship_update_to_one() {
        let operations = validate_document(&document(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "author"},
            "data": {"type": "people", "id": "9"}
        }])))
        .unwrap();
        let operation = &operations[0];
        assert_eq!(operation.kind, OperationKind::UpdateRelationship);
        assert_eq!(operation.resource_type, "articles");
        assert_eq!(operation.id.as_deref(), Some("13"));
        assert_eq!(operation.relationships.len(), 1);
        assert_eq!(
            operation.relationships.get("author"),
            Some(&RelationshipValue::One(ResourceIdentifier::new(
                "people", "9"
            )))
        );
    }

    #[test]
    fn test_relationship_update_distinguishes_null_and_absent_data() {
        let operations = validate_document(&document(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "author"},
            "data": null
        }])))
        .unwrap();
        assert_eq!(
            operations[0].relationships.get("author"),
            Some(&RelationshipValue::Clear)
        );

        let error = first_error(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "author"}
        }]));
        assert_eq!(error.id, "missing-primary-data");
        assert_eq!(error.source.pointer, "/atomic:operations/0");
    }

    #[test]
    fn test_relationship_update_to_many() {
        let operations = validate_document(&document(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "tags"},
            "data": [{"type": "tags", "id": "2"}, {"type": "tags", "id": "3"}]
        }])))
        .unwrap();
        assert_eq!(
            operations[0].relationships.get("tags"),
            Some(&RelationshipValue::Many(vec![
                ResourceIdentifier::new("tags", "2"),
                ResourceIdentifier::new("tags", "3"),
            ]))
        );

        // An empty list is a valid clear-all for a to-many relation.
        let operations = validate_document(&document(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "tags"},
            "data": []
        }])))
        .unwrap();
        assert_eq!(
            operations[0].relationships.get("tags"),
            Some(&RelationshipValue::Many(Vec::new()))
        );
    }

    #[test]
    fn test_relationship_update_data_shape_checks() {
        let error = first_error(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "tags"},
            "data": "nope"
        }]));
        assert_eq!(error.id, "invalid-primary-data-type");
        assert_eq!(error.source.pointer, "/atomic:operations/0/data");

        let error = first_error(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "tags"},
            "data": [{"type": "tags"}]
        }]));
        assert_eq!(error.id, "missing-id");
        assert_eq!(error.source.pointer, "/atomic:operations/0/data");

        let error = first_error(json!([{
            "op": "update",
            "ref": {"type": "articles", "id": "13", "relationship": "author"},
            "data": {"id": "9"}
        }]));
        assert_eq!(error.id, "missing-type");
    }
}
