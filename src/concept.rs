//! Concept identities, literal values and concept metadata.
//!
//! Every schema type, role, and instance stored in the graph is identified by a
//! [`ConceptId`] and described by a [`Concept`]. Attribute instances carry a
//! [`Value`]. The [`AtomicConceptAllocator`] provides thread-safe id generation.

use std::cmp::Ordering;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Unique, niche-optimized identifier for a concept.
///
/// Uses `NonZeroU64` so that `Option<ConceptId>` is the same size as `ConceptId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ConceptId(NonZeroU64);

impl ConceptId {
    /// Create a `ConceptId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(ConceptId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// The datatype an attribute type holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Long,
    String,
    Boolean,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Long => write!(f, "long"),
            ValueType::String => write!(f, "string"),
            ValueType::Boolean => write!(f, "boolean"),
        }
    }
}

/// A literal attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    String(String),
}

impl Value {
    /// The datatype of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Long(_) => ValueType::Long,
            Value::String(_) => ValueType::String,
        }
    }

    /// Compare two values of the same datatype.
    ///
    /// Values of different datatypes are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Classification of a concept in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConceptKind {
    EntityType,
    RelationType,
    AttributeType(ValueType),
    Role,
    Entity,
    Relationship,
    Attribute,
}

impl ConceptKind {
    /// Whether this concept belongs to the schema (types and roles).
    pub fn is_schema(self) -> bool {
        matches!(
            self,
            ConceptKind::EntityType
                | ConceptKind::RelationType
                | ConceptKind::AttributeType(_)
                | ConceptKind::Role
        )
    }

    /// Whether instances can be created from this concept.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            ConceptKind::EntityType | ConceptKind::RelationType | ConceptKind::AttributeType(_)
        )
    }
}

impl std::fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConceptKind::EntityType => write!(f, "entity-type"),
            ConceptKind::RelationType => write!(f, "relation-type"),
            ConceptKind::AttributeType(vt) => write!(f, "attribute-type({vt})"),
            ConceptKind::Role => write!(f, "role"),
            ConceptKind::Entity => write!(f, "entity"),
            ConceptKind::Relationship => write!(f, "relationship"),
            ConceptKind::Attribute => write!(f, "attribute"),
        }
    }
}

/// Metadata describing a concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    /// Unique identifier.
    pub id: ConceptId,
    /// What kind of concept this is.
    pub kind: ConceptKind,
    /// Schema label (types and roles only).
    pub label: Option<String>,
    /// Direct type of an instance.
    pub type_id: Option<ConceptId>,
    /// Value held by an attribute instance.
    pub value: Option<Value>,
    /// Whether the reasoner created this concept.
    pub inferred: bool,
}

impl Concept {
    /// A schema concept with a label.
    pub fn schema(id: ConceptId, kind: ConceptKind, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            label: Some(label.into()),
            type_id: None,
            value: None,
            inferred: false,
        }
    }

    /// An instance of `type_id`.
    pub fn instance(id: ConceptId, kind: ConceptKind, type_id: ConceptId) -> Self {
        Self {
            id,
            kind,
            label: None,
            type_id: Some(type_id),
            value: None,
            inferred: false,
        }
    }

    /// Attach a value (attribute instances).
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Mark this concept as produced by inference.
    pub fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }
}

/// Thread-safe concept ID allocator.
///
/// Produces monotonically increasing IDs starting from 1.
#[derive(Debug)]
pub struct AtomicConceptAllocator {
    next: AtomicU64,
}

impl AtomicConceptAllocator {
    /// Create a new allocator that starts from ID 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next concept ID.
    pub fn next_id(&self) -> StoreResult<ConceptId> {
        let raw = self.next.fetch_add(1, AtomicOrdering::Relaxed);
        ConceptId::new(raw).ok_or(StoreError::AllocatorExhausted)
    }

    /// Return the next ID that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(AtomicOrdering::Relaxed)
    }
}

impl Default for AtomicConceptAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<ConceptId>>(),
            std::mem::size_of::<ConceptId>()
        );
    }

    #[test]
    fn concept_id_zero_is_none() {
        assert!(ConceptId::new(0).is_none());
        assert_eq!(ConceptId::new(42).unwrap().get(), 42);
        assert_eq!(ConceptId::new(42).unwrap().to_string(), "V42");
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let alloc = AtomicConceptAllocator::new();
        assert_eq!(alloc.next_id().unwrap().get(), 1);
        assert_eq!(alloc.next_id().unwrap().get(), 2);
        assert_eq!(alloc.peek_next(), 3);
    }

    #[test]
    fn values_compare_within_datatype_only() {
        assert_eq!(
            Value::Long(3).compare(&Value::Long(5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Long(3).compare(&Value::from("3")), None);
    }

    #[test]
    fn value_deserializes_untagged() {
        let vals: Vec<Value> = serde_json::from_str(r#"[30, "Alice", true]"#).unwrap();
        assert_eq!(
            vals,
            vec![Value::Long(30), Value::from("Alice"), Value::Boolean(true)]
        );
    }

    #[test]
    fn schema_kinds() {
        assert!(ConceptKind::Role.is_schema());
        assert!(!ConceptKind::Role.is_type());
        assert!(ConceptKind::AttributeType(ValueType::Long).is_type());
        assert!(!ConceptKind::Entity.is_schema());
    }
}
