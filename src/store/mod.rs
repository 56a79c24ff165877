//! The graph store the reasoner reads from and writes inferred facts into.
//!
//! The reasoner never owns storage. Everything it needs from the graph goes
//! through the [`GraphStore`] trait:
//!
//! - schema lookups (labels, type hierarchy, roles, ownership)
//! - pattern matching, returning a lazy [`AnswerIter`]
//! - idempotent writes of inferred attributes, ownerships and relationships
//!
//! [`mem::MemGraph`] is the in-memory implementation used by the CLI and tests.
//!
//! Attribute ownership is modelled as an *implicit* relationship type per
//! attribute type, following the naming conventions in this module:
//! `@has-age` relates `@has-age-owner` and `@has-age-value`.

pub mod mem;

use crate::answer::Answer;
use crate::atom::Atom;
use crate::concept::{Concept, ConceptId, ConceptKind, Value};
use crate::error::StoreResult;

pub use mem::MemGraph;

/// Lazy sequence of answers produced by a store match.
pub type AnswerIter<'s> = Box<dyn Iterator<Item = Answer> + 's>;

const IMPLICIT_PREFIX: &str = "@has-";

/// Label of the implicit ownership relationship type for an attribute type.
pub fn has_type_label(attribute: &str) -> String {
    format!("{IMPLICIT_PREFIX}{attribute}")
}

/// Label of the owner role of an implicit ownership relationship.
pub fn has_owner_label(attribute: &str) -> String {
    format!("{IMPLICIT_PREFIX}{attribute}-owner")
}

/// Label of the value role of an implicit ownership relationship.
pub fn has_value_label(attribute: &str) -> String {
    format!("{IMPLICIT_PREFIX}{attribute}-value")
}

/// Whether a label names an implicit ownership type or role.
pub fn is_implicit_label(label: &str) -> bool {
    label.starts_with(IMPLICIT_PREFIX)
}

/// The attribute label behind an implicit ownership relationship type label.
pub fn attribute_of_implicit(label: &str) -> Option<&str> {
    let rest = label.strip_prefix(IMPLICIT_PREFIX)?;
    if rest.ends_with("-owner") || rest.ends_with("-value") {
        return None;
    }
    Some(rest)
}

/// External collaborator contract: a typed graph within the caller's transaction.
pub trait GraphStore {
    /// Schema type or role by label.
    fn schema_concept(&self, label: &str) -> Option<ConceptId>;

    /// Concept metadata by id.
    fn concept(&self, id: ConceptId) -> Option<Concept>;

    /// `ty` and all its supertypes.
    fn supertypes(&self, ty: ConceptId) -> Vec<ConceptId>;

    /// `ty` and all its subtypes.
    fn subtypes(&self, ty: ConceptId) -> Vec<ConceptId>;

    /// Roles `ty` can play, including inherited ones.
    fn plays(&self, ty: ConceptId) -> Vec<ConceptId>;

    /// Roles related by a relationship type, including inherited ones.
    fn relates(&self, relation_type: ConceptId) -> Vec<ConceptId>;

    /// Whether instances of `owner_type` may own attributes of `attribute_type`.
    fn owns(&self, owner_type: ConceptId, attribute_type: ConceptId) -> bool;

    /// Answers to `atom` extending `partial`.
    fn match_atom<'s>(&'s self, atom: &Atom, partial: &Answer) -> AnswerIter<'s>;

    /// Look up or create the attribute of `attribute_type` holding `value`.
    ///
    /// Never creates two instances for the same `(type, value)` pair.
    fn put_attribute_inferred(&self, attribute_type: ConceptId, value: &Value) -> StoreResult<ConceptId>;

    /// Attach `attribute` to `owner`, returning the ownership relationship.
    ///
    /// Attaching twice returns the same relationship.
    fn attach_attribute_inferred(&self, owner: ConceptId, attribute: ConceptId) -> StoreResult<ConceptId>;

    /// Look up or create a relationship of `relation_type` with exactly these
    /// `(role, player)` pairs.
    fn put_relationship_inferred(
        &self,
        relation_type: ConceptId,
        role_players: &[(ConceptId, ConceptId)],
    ) -> StoreResult<ConceptId>;

    /// Schema label of a type or role.
    fn label(&self, id: ConceptId) -> Option<String> {
        self.concept(id).and_then(|c| c.label)
    }

    /// Direct type of an instance.
    fn type_of(&self, instance: ConceptId) -> Option<ConceptId> {
        self.concept(instance).and_then(|c| c.type_id)
    }

    /// Value held by an attribute instance.
    fn value_of(&self, attribute: ConceptId) -> Option<Value> {
        self.concept(attribute).and_then(|c| c.value)
    }

    fn is_subtype(&self, sub: ConceptId, sup: ConceptId) -> bool {
        self.supertypes(sub).contains(&sup)
    }

    fn is_attribute_type(&self, ty: ConceptId) -> bool {
        self.concept(ty)
            .is_some_and(|c| matches!(c.kind, ConceptKind::AttributeType(_)))
    }

    /// The attribute type an implicit ownership relationship type stands for.
    fn attribute_type_of_implicit(&self, relation_type: ConceptId) -> Option<ConceptId> {
        let label = self.label(relation_type)?;
        self.schema_concept(attribute_of_implicit(&label)?)
    }

    /// Implicit `(relationship type, owner role, value role)` for an attribute type.
    fn implicit_ownership(&self, attribute_type: ConceptId) -> Option<(ConceptId, ConceptId, ConceptId)> {
        let label = self.label(attribute_type)?;
        Some((
            self.schema_concept(&has_type_label(&label))?,
            self.schema_concept(&has_owner_label(&label))?,
            self.schema_concept(&has_value_label(&label))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_labels() {
        assert_eq!(has_type_label("age"), "@has-age");
        assert_eq!(has_owner_label("age"), "@has-age-owner");
        assert_eq!(has_value_label("age"), "@has-age-value");
        assert!(is_implicit_label("@has-age-value"));
        assert!(!is_implicit_label("age"));
    }

    #[test]
    fn attribute_of_implicit_type_only() {
        assert_eq!(attribute_of_implicit("@has-age"), Some("age"));
        assert_eq!(attribute_of_implicit("@has-age-owner"), None);
        assert_eq!(attribute_of_implicit("marriage"), None);
    }
}
