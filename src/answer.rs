//! Answers: immutable variable substitutions.
//!
//! An [`Answer`] maps query variables to concrete concepts. Answers only grow by
//! merging into a new answer; nothing mutates an answer in place once it exists.

use std::collections::{BTreeMap, BTreeSet};

use crate::concept::ConceptId;
use crate::unifier::Unifier;
use crate::var::Var;

/// A substitution from variables to concepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Answer {
    map: BTreeMap<Var, ConceptId>,
}

impl Answer {
    /// The empty substitution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an answer from pairs. Later pairs override earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Var, ConceptId)>) -> Self {
        Self {
            map: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, var: &Var) -> Option<ConceptId> {
        self.map.get(var).copied()
    }

    pub fn contains_var(&self, var: &Var) -> bool {
        self.map.contains_key(var)
    }

    pub fn vars(&self) -> BTreeSet<Var> {
        self.map.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Var, &ConceptId)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether no variable is bound to different concepts in the two answers.
    pub fn is_compatible_with(&self, other: &Answer) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .map
            .iter()
            .all(|(var, id)| large.get(var).is_none_or(|other_id| other_id == *id))
    }

    /// Union of two answers, or `None` if they disagree on a variable.
    pub fn merge(&self, other: &Answer) -> Option<Answer> {
        if !self.is_compatible_with(other) {
            return None;
        }
        let mut map = self.map.clone();
        map.extend(other.map.iter().map(|(v, id)| (v.clone(), *id)));
        Some(Answer { map })
    }

    /// This answer plus one binding, or `None` if `var` is bound elsewhere.
    pub fn extend(&self, var: Var, id: ConceptId) -> Option<Answer> {
        match self.get(&var) {
            Some(existing) if existing != id => None,
            Some(_) => Some(self.clone()),
            None => {
                let mut map = self.map.clone();
                map.insert(var, id);
                Some(Answer { map })
            }
        }
    }

    /// Restrict the answer to the given variables.
    pub fn project<'a>(&self, vars: impl IntoIterator<Item = &'a Var>) -> Answer {
        let map = vars
            .into_iter()
            .filter_map(|v| self.map.get(v).map(|id| (v.clone(), *id)))
            .collect();
        Answer { map }
    }

    /// Rename variables through a unifier.
    ///
    /// Keys in the unifier's domain are renamed to their target. Keys that are not
    /// renamed but collide with a unifier target are dropped, since they belong to a
    /// different namespace than the renamed variables. Returns `None` if two keys
    /// end up bound to different concepts under the same name.
    pub fn unify(&self, unifier: &Unifier) -> Option<Answer> {
        let targets: BTreeSet<&Var> = unifier.targets().collect();
        let mut map: BTreeMap<Var, ConceptId> = BTreeMap::new();
        for (var, id) in &self.map {
            let renamed = match unifier.get(var) {
                Some(target) => target.clone(),
                None if targets.contains(var) => continue,
                None => var.clone(),
            };
            match map.get(&renamed) {
                Some(existing) if existing != id => return None,
                _ => {
                    map.insert(renamed, *id);
                }
            }
        }
        Some(Answer { map })
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (var, id)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}: {id}")?;
        }
        write!(f, "}}")
    }
}
