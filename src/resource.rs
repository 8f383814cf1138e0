//! Stored resource instances and their wire representation.
//!
//! A [`Resource`] is what handlers load, mutate and persist: the typed form
//! of one resource instance. Serialization into a JSON:API resource object
//! is schema-driven so that responses always carry the full set of defined
//! attributes and relationships, with nulls and empty lists for unset ones.

use serde_json::{Map, Value, json};

use crate::operation::{AttributeMap, RelationshipMap, RelationshipValue, ResourceIdentifier};
use crate::schema::{Cardinality, ResourceSchema};

/// One stored resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// The type of this resource (e.g. "articles")
    pub resource_type: String,
    /// Server-assigned or client-supplied identifier
    pub id: String,
    /// Attribute values
    pub attributes: AttributeMap,
    /// Set relationships; unset ones are simply absent
    pub relationships: RelationshipMap,
}

impl Resource {
    /// Create a resource from its parts.
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: AttributeMap,
        relationships: RelationshipMap,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes,
            relationships: normalized(relationships),
        }
    }

    /// The identifier addressing this resource.
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(&self.resource_type, &self.id)
    }

    /// Get one attribute value.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Get one relationship value.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipValue> {
        self.relationships.get(name)
    }

    /// Merge a partial update into this resource.
    ///
    /// Supplied attributes replace stored ones; a cleared relationship is
    /// dropped, anything else replaces the stored value. Fields the update
    /// does not mention are left untouched.
    pub fn merge(&mut self, attributes: &AttributeMap, relationships: &RelationshipMap) {
        for (name, value) in attributes {
            self.attributes.insert(name.clone(), value.clone());
        }
        for (name, value) in relationships {
            if value.is_clear() {
                self.relationships.remove(name);
            } else {
                self.relationships.insert(name.clone(), value.clone());
            }
        }
    }

    /// Render this resource as a JSON:API resource object.
    ///
    /// The schema drives the output: every defined attribute appears (null
    /// when unset) and, when the schema defines relationships, every defined
    /// relationship appears with `{"data": null}` / `{"data": []}` defaults.
    pub fn to_resource_object(&self, schema: &ResourceSchema) -> Value {
        let mut attributes = Map::new();
        for definition in &schema.attributes {
            let value = self
                .attributes
                .get(&definition.name)
                .cloned()
                .unwrap_or(Value::Null);
            attributes.insert(definition.name.clone(), value);
        }

        let mut object = Map::new();
        object.insert("type".into(), Value::String(self.resource_type.clone()));
        object.insert("id".into(), Value::String(self.id.clone()));
        object.insert("attributes".into(), Value::Object(attributes));

        if !schema.relationships.is_empty() {
            let mut relationships = Map::new();
            for definition in &schema.relationships {
                let data = match self.relationships.get(&definition.name) {
                    Some(value) => json!({ "data": value }),
                    None => match definition.cardinality {
                        Cardinality::ToOne => json!({ "data": null }),
                        Cardinality::ToMany => json!({ "data": [] }),
                    },
                };
                relationships.insert(definition.name.clone(), data);
            }
            object.insert("relationships".into(), Value::Object(relationships));
        }

        Value::Object(object)
    }
}

/// Drop cleared entries so stored relationships only hold live targets.
fn normalized(relationships: RelationshipMap) -> RelationshipMap {
    relationships
        .into_iter()
        .filter(|(_, value)| !matches!(value, RelationshipValue::Clear))
        .collect()
}
