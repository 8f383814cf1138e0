//! Typed model of atomic operations after validation.
//!
//! The validator turns the raw `atomic:operations` entries into
//! [`Operation`] values; everything downstream (engine, handlers, storage)
//! works on these instead of raw JSON.
//!
//! # Key Types
//!
//! * [`OperationKind`] - The four normalized operation kinds
//! * [`ResourceIdentifier`] - A `(type, id)` pair addressing one resource
//! * [`RelationshipValue`] - A to-one target, a to-many target list, or a clear
//! * [`Operation`] - One normalized, executable operation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute name to value mapping of one operation or resource.
pub type AttributeMap = Map<String, Value>;

/// Relationship name to value mapping of one operation or resource.
pub type RelationshipMap = BTreeMap<String, RelationshipValue>;

/// The normalized kind of an operation.
///
/// The wire `op` member only ever carries `add`, `update` or `remove`;
/// `update-relationship` is derived by the validator when an update is
/// addressed through `ref` with a named relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Create a new resource.
    Add,
    /// Update attributes and relationships of an existing resource.
    Update,
    /// Delete an existing resource.
    Remove,
    /// Replace a single named relationship of an existing resource.
    UpdateRelationship,
}

impl OperationKind {
    /// Parse a wire `op` code.
    ///
    /// Returns `None` for anything but the three codes the extension
    /// defines; `update-relationship` is never a wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "add" => Some(Self::Add),
            "update" => Some(Self::Update),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }

    /// The kind's stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::UpdateRelationship => "update-relationship",
        }
    }

    /// The kind a registry lookup dispatches through.
    ///
    /// Relationship updates are served by the handler registered for
    /// `update`; there is no separate registration for them.
    pub fn registry_kind(self) -> Self {
        match self {
            Self::UpdateRelationship => Self::Update,
            kind => kind,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(type, id)` pair addressing one resource instance.
///
/// `id` is absent only in the primary data of `add` operations, where the
/// server assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl ResourceIdentifier {
    /// Create an identifier addressing an existing resource.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            resource_type: resource_type.into(),
        }
    }
}

/// The value a relationship is set to.
///
/// Mirrors the three JSON shapes of relationship data: an identifier object
/// (to-one), an identifier array (to-many, empty meaning "clear all") and
/// null (clear a to-one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipValue {
    /// Replace a to-many relation with the listed targets.
    Many(Vec<ResourceIdentifier>),
    /// Replace a to-one relation with the given target.
    One(ResourceIdentifier),
    /// Clear a to-one relation (wire form `null`).
    Clear,
}

impl RelationshipValue {
    /// Whether this value clears the relation.
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear) || matches!(self, Self::Many(targets) if targets.is_empty())
    }

    /// The identifiers this value points at, in order.
    pub fn identifiers(&self) -> std::slice::Iter<'_, ResourceIdentifier> {
        match self {
            Self::Many(targets) => targets.iter(),
            Self::One(target) => std::slice::from_ref(target).iter(),
            Self::Clear => Default::default(),
        }
    }
}

/// One normalized, executable operation.
///
/// Operations are order-significant within a document; later operations may
/// rely on the side effects of earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub resource_type: String,
    /// Target id; present for everything but server-assigned `add`s.
    pub id: Option<String>,
    pub attributes: AttributeMap,
    pub relationships: RelationshipMap,
}

impl Operation {
    /// Create an operation carrying no attributes or relationships.
    pub fn new(
        kind: OperationKind,
        resource_type: impl Into<String>,
        id: Option<String>,
    ) -> Self {
        Self {
            kind,
            resource_type: resource_type.into(),
            id,
            attributes: AttributeMap::new(),
            relationships: RelationshipMap::new(),
        }
    }

    /// Whether `other` continues the same grouped-mode run: identical kind
    /// and resource type.
    pub fn same_run(&self, other: &Operation) -> bool {
        self.kind == other.kind && self.resource_type == other.resource_type
    }
}
