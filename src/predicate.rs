//! Id and value constraints on query variables.
//!
//! - [`IdPredicate`] binds a variable to one specific concept.
//! - [`ValuePredicate`] compares the value held by a variable against a literal,
//!   or indirectly against the value of another (inner) variable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::concept::{ConceptId, Value};
use crate::unifier::Unifier;
use crate::var::Var;

/// Binds `var` to the concept `concept`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdPredicate {
    var: Var,
    concept: ConceptId,
}

impl IdPredicate {
    pub fn new(var: Var, concept: ConceptId) -> Self {
        Self { var, concept }
    }

    pub fn var(&self) -> &Var {
        &self.var
    }

    pub fn concept(&self) -> ConceptId {
        self.concept
    }

    /// Same concept, regardless of the variable name.
    pub fn is_alpha_equivalent(&self, other: &IdPredicate) -> bool {
        self.concept == other.concept
    }

    pub fn alpha_equivalence_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        "id".hash(&mut hasher);
        self.concept.hash(&mut hasher);
        hasher.finish()
    }

    pub fn apply_unifier(&self, unifier: &Unifier) -> Self {
        Self {
            var: unifier.apply(&self.var),
            concept: self.concept,
        }
    }
}

impl std::fmt::Display for IdPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} id {}", self.var, self.concept)
    }
}

/// Comparison operator of a value predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
}

impl Comparator {
    /// Evaluate `lhs <op> rhs`. Incomparable values never satisfy a comparison.
    pub fn test(self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Neq => lhs != rhs,
            Comparator::Contains => match (lhs, rhs) {
                (Value::String(l), Value::String(r)) => l.contains(r.as_str()),
                _ => false,
            },
            Comparator::Gt => matches!(lhs.compare(rhs), Some(Greater)),
            Comparator::Gte => matches!(lhs.compare(rhs), Some(Greater | Equal)),
            Comparator::Lt => matches!(lhs.compare(rhs), Some(Less)),
            Comparator::Lte => matches!(lhs.compare(rhs), Some(Less | Equal)),
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Comparator::Eq => "=",
            Comparator::Neq => "!=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Contains => "contains",
        };
        write!(f, "{s}")
    }
}

/// Right-hand side of a value predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Literal(Value),
    Var(Var),
}

/// Constrains the value held by `var`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValuePredicate {
    var: Var,
    comparator: Comparator,
    operand: Operand,
}

impl ValuePredicate {
    pub fn new(var: Var, comparator: Comparator, operand: Operand) -> Self {
        Self {
            var,
            comparator,
            operand,
        }
    }

    /// `var == value`.
    pub fn equals(var: Var, value: impl Into<Value>) -> Self {
        Self::new(var, Comparator::Eq, Operand::Literal(value.into()))
    }

    /// `var <op> value`.
    pub fn compare(var: Var, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self::new(var, comparator, Operand::Literal(value.into()))
    }

    /// `var <op> inner`, comparing against another variable's value.
    pub fn against(var: Var, comparator: Comparator, inner: Var) -> Self {
        Self::new(var, comparator, Operand::Var(inner))
    }

    pub fn var(&self) -> &Var {
        &self.var
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Equality against a concrete literal.
    pub fn is_specific(&self) -> bool {
        self.equals_value().is_some()
    }

    /// The literal this predicate pins the value to, if any.
    pub fn equals_value(&self) -> Option<&Value> {
        match (&self.comparator, &self.operand) {
            (Comparator::Eq, Operand::Literal(v)) => Some(v),
            _ => None,
        }
    }

    /// The inner variable of an indirect comparison.
    pub fn inner_var(&self) -> Option<&Var> {
        match &self.operand {
            Operand::Var(v) => Some(v),
            Operand::Literal(_) => None,
        }
    }

    /// Evaluate against a candidate value when the operand is a literal.
    pub fn test_literal(&self, candidate: &Value) -> Option<bool> {
        match &self.operand {
            Operand::Literal(v) => Some(self.comparator.test(candidate, v)),
            Operand::Var(_) => None,
        }
    }

    /// Whether some value could satisfy both predicates.
    ///
    /// Two equalities are compatible when they pin the same literal; an equality is
    /// compatible with a literal comparison it satisfies. Anything involving an
    /// inner variable is not provably contradictory and is accepted.
    pub fn is_compatible_with(&self, other: &ValuePredicate) -> bool {
        match (self.equals_value(), other.equals_value()) {
            (Some(a), Some(b)) => a == b,
            (Some(a), None) => other.test_literal(a).unwrap_or(true),
            (None, Some(b)) => self.test_literal(b).unwrap_or(true),
            (None, None) => true,
        }
    }

    /// Same comparator and same literal; inner variables match any inner variable.
    pub fn is_alpha_equivalent(&self, other: &ValuePredicate) -> bool {
        self.comparator == other.comparator
            && match (&self.operand, &other.operand) {
                (Operand::Literal(a), Operand::Literal(b)) => a == b,
                (Operand::Var(_), Operand::Var(_)) => true,
                _ => false,
            }
    }

    pub fn alpha_equivalence_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.comparator.hash(&mut hasher);
        match &self.operand {
            Operand::Literal(v) => v.hash(&mut hasher),
            Operand::Var(_) => "var".hash(&mut hasher),
        }
        hasher.finish()
    }

    /// Variables mentioned by this predicate.
    pub fn var_names(&self) -> impl Iterator<Item = &Var> {
        std::iter::once(&self.var).chain(self.inner_var())
    }

    pub fn apply_unifier(&self, unifier: &Unifier) -> Self {
        let operand = match &self.operand {
            Operand::Var(v) => Operand::Var(unifier.apply(v)),
            lit @ Operand::Literal(_) => lit.clone(),
        };
        Self {
            var: unifier.apply(&self.var),
            comparator: self.comparator,
            operand,
        }
    }
}

impl std::fmt::Display for ValuePredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operand {
            Operand::Literal(v) if self.comparator == Comparator::Eq => write!(f, "{v}"),
            Operand::Literal(v) => write!(f, "{} {v}", self.comparator),
            Operand::Var(v) => write!(f, "{} {v}", self.comparator),
        }
    }
}
