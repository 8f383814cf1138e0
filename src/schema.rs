//! Per-resource-type schema definitions and validation.
//!
//! A [`ResourceSchema`] declares the attributes and relationships one
//! resource type accepts. Handlers validate normalized operations against
//! their schema immediately before each mutation, producing wire-ready
//! error objects with pointers relative to the operation object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorObject;
use crate::operation::{Operation, OperationKind, RelationshipValue};

/// Value types an attribute can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    /// String value
    String,
    /// Boolean value
    Boolean,
    /// Integer number
    Integer,
    /// Decimal number
    Decimal,
}

impl AttributeType {
    /// The type's name as used in error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Decimal => value.is_number(),
        }
    }
}

/// Definition of one attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    /// Attribute name
    pub name: String,
    /// Data type of the attribute
    #[serde(rename = "type")]
    pub data_type: AttributeType,
    /// Whether the attribute must be present when creating a resource
    #[serde(default)]
    pub required: bool,
}

impl AttributeDefinition {
    /// Define an optional attribute.
    pub fn new(name: impl Into<String>, data_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: false,
        }
    }

    /// Define a required attribute.
    pub fn required(name: impl Into<String>, data_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
        }
    }
}

/// Whether a relationship points at one resource or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    /// Single target, clearable with null
    ToOne,
    /// Target list, clearable with an empty array
    ToMany,
}

/// Definition of one relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDefinition {
    /// Relationship name
    pub name: String,
    /// To-one or to-many
    pub cardinality: Cardinality,
    /// Resource type the relationship points at
    pub target_type: String,
}

impl RelationshipDefinition {
    /// Define a to-one relationship.
    pub fn to_one(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::ToOne,
            target_type: target_type.into(),
        }
    }

    /// Define a to-many relationship.
    pub fn to_many(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::ToMany,
            target_type: target_type.into(),
        }
    }
}

/// Schema for one resource type.
///
/// # Examples
///
/// ```
/// use jsonapi_atomic::schema::{AttributeDefinition, AttributeType, RelationshipDefinition, ResourceSchema};
///
/// let schema = ResourceSchema::new("articles")
///     .attribute(AttributeDefinition::required("title", AttributeType::String))
///     .attribute(AttributeDefinition::new("published", AttributeType::Boolean))
///     .relationship(RelationshipDefinition::to_one("author", "people"))
///     .relationship(RelationshipDefinition::to_many("tags", "tags"));
///
/// assert!(schema.attribute_definition("title").is_some());
/// assert!(schema.relationship_definition("editor").is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    /// Resource type this schema describes
    pub resource_type: String,
    /// Attribute definitions
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    /// Relationship definitions
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

/// Validation depth for handler-level checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Enforce every schema rule, including required attributes (`add`).
    Full,
    /// Check only the supplied fields (`update` variants).
    Partial,
}

impl ResourceSchema {
    /// Create an empty schema for `resource_type`.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Add an attribute definition.
    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    /// Add a relationship definition.
    pub fn relationship(mut self, definition: RelationshipDefinition) -> Self {
        self.relationships.push(definition);
        self
    }

    /// Look up an attribute definition by name.
    pub fn attribute_definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|definition| definition.name == name)
    }

    /// Look up a relationship definition by name.
    pub fn relationship_definition(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|definition| definition.name == name)
    }

    /// Collect every schema violation in the operation's data.
    ///
    /// Pointers are relative to the operation object. For relationship
    /// updates the offending value lives directly under `data` and the
    /// relationship name under `ref`, so pointers shift accordingly.
    pub fn validate(&self, operation: &Operation, mode: ValidationMode) -> Vec<ErrorObject> {
        let mut errors = Vec::new();

        for (name, value) in &operation.attributes {
            match self.attribute_definition(name) {
                None => errors.push(ErrorObject::unknown_attribute(name)),
                Some(definition) => {
                    if value.is_null() {
                        if definition.required {
                            errors.push(ErrorObject::missing_required_attribute(name));
                        }
                    } else if !definition.data_type.matches(value) {
                        errors.push(ErrorObject::invalid_attribute_type(
                            name,
                            definition.data_type.as_str(),
                        ));
                    }
                }
            }
        }

        if mode == ValidationMode::Full {
            for definition in &self.attributes {
                if definition.required && !operation.attributes.contains_key(&definition.name) {
                    errors.push(ErrorObject::missing_required_attribute(&definition.name));
                }
            }
        }

        let via_ref = operation.kind == OperationKind::UpdateRelationship;
        for (name, value) in &operation.relationships {
            let value_pointer = || {
                if via_ref {
                    "/data".to_string()
                } else {
                    format!("/data/relationships/{name}")
                }
            };
            let Some(definition) = self.relationship_definition(name) else {
                let name_pointer = if via_ref { "/ref".to_string() } else { value_pointer() };
                errors.push(ErrorObject::unknown_relationship(name, name_pointer));
                continue;
            };
            match definition.cardinality {
                Cardinality::ToOne => {
                    if matches!(value, RelationshipValue::Many(_)) {
                        errors.push(ErrorObject::invalid_relationship_data(
                            name,
                            "is to-one and takes a single resource identifier or null",
                            value_pointer(),
                        ));
                        continue;
                    }
                }
                Cardinality::ToMany => {
                    if !matches!(value, RelationshipValue::Many(_)) {
                        errors.push(ErrorObject::invalid_relationship_data(
                            name,
                            "is to-many and takes an array of resource identifiers",
                            value_pointer(),
                        ));
                        continue;
                    }
                }
            }
            for identifier in value.identifiers() {
                if identifier.resource_type != definition.target_type {
                    errors.push(ErrorObject::invalid_relationship_data(
                        name,
                        &format!("must reference resources of type `{}`", definition.target_type),
                        value_pointer(),
                    ));
                }
                if identifier.id.as_deref().is_none_or(str::is_empty) {
                    errors.push(ErrorObject::invalid_relationship_data(
                        name,
                        "must reference resources by id",
                        value_pointer(),
                    ));
                }
            }
        }

        errors
    }
}
