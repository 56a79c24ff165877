//! Rich diagnostic error types for the reasoner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Rule-head legality problems are *not* errors: they are collected as messages by
//! [`crate::atom::Atom::validate_as_rule_head`] so every problem surfaces in one pass.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::fixture::FixtureError;

/// Top-level error type for the reasoner.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasonerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unifier(#[from] UnifierError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Fixture(#[from] FixtureError),
}

// ---------------------------------------------------------------------------
// Atom errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomError {
    #[error("illegal atom conversion: {atom}")]
    #[diagnostic(
        code(tgr::atom::illegal_conversion),
        help(
            "Only attribute-ownership atoms with a resolved attribute type can be \
             converted to their implicit relationship form. Make sure the attribute \
             type exists in the schema and that its implicit ownership types are defined."
        )
    )]
    IllegalConversion { atom: String },

    #[error("inconsistent value predicates on {var}: {first} and {second}")]
    #[diagnostic(
        code(tgr::atom::inconsistent_predicates),
        help(
            "A variable cannot be equal to two different literals at once. \
             Remove one of the predicates or use a comparison instead."
        )
    )]
    InconsistentPredicates {
        var: String,
        first: String,
        second: String,
    },

    #[error("cannot materialise {atom}: {reason}")]
    #[diagnostic(
        code(tgr::atom::illegal_materialisation),
        help(
            "Only attribute-ownership and relationship atoms can be written back to the \
             store as inferred facts. Validate the rule head before running the reasoner."
        )
    )]
    IllegalMaterialisation { atom: String, reason: String },

    #[error("ambiguous conclusion in {atom}: {count} unresolved value predicates")]
    #[diagnostic(
        code(tgr::atom::ambiguous_conclusion),
        help(
            "An inferred attribute needs exactly one concrete value. \
             Rule-head validation rejects heads like this one; run `tgr validate`."
        )
    )]
    AmbiguousConclusion { atom: String, count: usize },
}

/// Result type for atom operations.
pub type AtomResult<T> = std::result::Result<T, AtomError>;

// ---------------------------------------------------------------------------
// Unifier errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum UnifierError {
    #[error("unifier conflict on {var}: already mapped to {existing}, cannot map to {incoming}")]
    #[diagnostic(
        code(tgr::unifier::conflict),
        help(
            "Two unifiers disagree about the target of a variable. \
             Set `merge_policy = \"overwrite\"` in the reasoner config to let the \
             later mapping win, or check the rule head for repeated variables."
        )
    )]
    Conflict {
        var: String,
        existing: String,
        incoming: String,
    },
}

/// Result type for unifier operations.
pub type UnifierResult<T> = std::result::Result<T, UnifierError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("unknown schema label: {label}")]
    #[diagnostic(
        code(tgr::store::unknown_label),
        help("Define the type in the schema before referring to it.")
    )]
    UnknownLabel { label: String },

    #[error("schema label already defined: {label}")]
    #[diagnostic(
        code(tgr::store::duplicate_label),
        help("Schema labels are unique. Pick a different label or reuse the existing type.")
    )]
    DuplicateLabel { label: String },

    #[error("concept not found: {id}")]
    #[diagnostic(
        code(tgr::store::concept_not_found),
        help("The concept id does not exist in this store. Check that it came from the same store.")
    )]
    ConceptNotFound { id: u64 },

    #[error("concept {id} is not a type")]
    #[diagnostic(
        code(tgr::store::not_a_type),
        help("Instances can only be created from schema types.")
    )]
    NotAType { id: u64 },

    #[error("{label} is not an attribute type")]
    #[diagnostic(
        code(tgr::store::not_an_attribute_type),
        help("Attribute values can only be stored under attribute types.")
    )]
    NotAnAttributeType { label: String },

    #[error("value type mismatch for {label}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(tgr::store::value_type_mismatch),
        help("Attribute values must match the value type declared on their attribute type.")
    )]
    ValueTypeMismatch {
        label: String,
        expected: String,
        actual: String,
    },

    #[error("role {role} is not related by relation type {relation}")]
    #[diagnostic(
        code(tgr::store::role_not_related),
        help("Declare the role in the relation type's `relates` list.")
    )]
    RoleNotRelated { role: String, relation: String },

    #[error("concept allocator exhausted: cannot allocate more than u64::MAX concepts")]
    #[diagnostic(
        code(tgr::store::exhausted),
        help(
            "The concept id space is exhausted. This requires 2^64 allocations; \
             check for an allocation loop."
        )
    )]
    AllocatorExhausted,
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("query not found: {id}")]
    #[diagnostic(
        code(tgr::query::not_found),
        help("The query id does not belong to this arena.")
    )]
    NotFound { id: usize },

    #[error("variable {var} is unbound while materialising {atom}")]
    #[diagnostic(
        code(tgr::query::unbound_variable),
        help(
            "Every variable of a rule head must be bound by the rule body. \
             Run rule validation to find the offending rule."
        )
    )]
    UnboundVariable { var: String, atom: String },

    #[error("query has no atoms")]
    #[diagnostic(
        code(tgr::query::empty),
        help("A query needs at least one atom to resolve.")
    )]
    Empty,
}

/// Result type for query arena operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Convenience alias for functions returning reasoner results.
pub type ReasonerResult<T> = std::result::Result<T, ReasonerError>;
