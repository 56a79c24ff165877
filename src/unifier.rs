//! Unifiers: variable mappings between structurally related patterns.
//!
//! A [`Unifier`] maps variables of a *child* pattern (typically a rule head) onto
//! variables of a *parent* pattern (the atom being resolved). Merging two unifiers
//! that disagree on a variable's target is governed by an explicit [`MergePolicy`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{UnifierError, UnifierResult};
use crate::var::Var;

/// How [`Unifier::merge`] resolves a variable mapped to two different targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Reject the merge with [`UnifierError::Conflict`].
    #[default]
    Strict,
    /// The right-hand unifier wins.
    Overwrite,
}

/// A mapping from child variables to parent variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unifier {
    map: BTreeMap<Var, Var>,
}

impl Unifier {
    /// The identity (empty) unifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// A unifier with a single mapping.
    pub fn single(from: Var, to: Var) -> Self {
        Self::from_pairs([(from, to)])
    }

    /// Build a unifier from pairs. Later pairs override earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Var, Var)>) -> Self {
        Self {
            map: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, var: &Var) -> Option<&Var> {
        self.map.get(var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Var)> {
        self.map.iter()
    }

    /// The parent variables this unifier maps onto.
    pub fn targets(&self) -> impl Iterator<Item = &Var> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rename a variable; unmapped variables are returned unchanged.
    pub fn apply(&self, var: &Var) -> Var {
        self.map.get(var).cloned().unwrap_or_else(|| var.clone())
    }

    /// Merge two unifiers into a new one.
    pub fn merge(&self, other: &Unifier, policy: MergePolicy) -> UnifierResult<Unifier> {
        let mut map = self.map.clone();
        for (from, to) in &other.map {
            match map.get(from) {
                Some(existing) if existing != to => match policy {
                    MergePolicy::Strict => {
                        return Err(UnifierError::Conflict {
                            var: from.to_string(),
                            existing: existing.to_string(),
                            incoming: to.to_string(),
                        });
                    }
                    MergePolicy::Overwrite => {
                        tracing::debug!(var = %from, old = %existing, new = %to, "unifier overwrite");
                        map.insert(from.clone(), to.clone());
                    }
                },
                Some(_) => {}
                None => {
                    map.insert(from.clone(), to.clone());
                }
            }
        }
        Ok(Unifier { map })
    }
}

impl std::fmt::Display for Unifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (from, to)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{from} -> {to}")?;
        }
        write!(f, "}}")
    }
}
