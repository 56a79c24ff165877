//! Alpha-equivalence: atom equality up to consistent variable renaming.
//!
//! Two notions live here:
//!
//! - [`Atom::is_alpha_equivalent`] / [`Atom::alpha_equivalence_hash`]: structural
//!   identity modulo a bijective renaming of variables. Used to recognise a
//!   subgoal already under expansion and to key the supernode cache.
//! - `PartialEq` / `Hash` for [`Atom`]: same kind, type and primary variable, with
//!   role players compared literally and predicates compared as multisets under
//!   alpha-equivalence.
//!
//! Hashes are recomputed from the immutable atom on demand; callers that need
//! them repeatedly memoise through [`AlphaKey`].

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::concept::ConceptId;
use crate::predicate::{IdPredicate, Operand, ValuePredicate};
use crate::var::Var;

use super::{Atom, AtomKind};

/// A partial bijection between the variables of two atoms.
#[derive(Debug, Clone, Default)]
struct Renaming {
    forward: BTreeMap<Var, Var>,
    backward: BTreeMap<Var, Var>,
}

impl Renaming {
    fn bind(&mut self, a: &Var, b: &Var) -> bool {
        match (self.forward.get(a), self.backward.get(b)) {
            (Some(x), Some(y)) => x == b && y == a,
            (None, None) => {
                self.forward.insert(a.clone(), b.clone());
                self.backward.insert(b.clone(), a.clone());
                true
            }
            _ => false,
        }
    }

    /// Bind two optional-name variables: anonymous variables only match anonymous
    /// variables and never constrain the renaming.
    fn bind_if_named(&mut self, a: &Var, b: &Var) -> bool {
        match (a.is_user_defined(), b.is_user_defined()) {
            (true, true) => self.bind(a, b),
            (false, false) => true,
            _ => false,
        }
    }
}

/// One element of an atom's unordered structure.
#[derive(Debug, Clone, Copy)]
enum Element<'a> {
    Role(Option<ConceptId>, &'a Var),
    Value(&'a ValuePredicate),
    Id(&'a IdPredicate),
}

impl Element<'_> {
    fn unify(&self, other: &Element<'_>, renaming: &mut Renaming) -> bool {
        match (self, other) {
            (Element::Role(r1, p1), Element::Role(r2, p2)) => r1 == r2 && renaming.bind(p1, p2),
            (Element::Value(a), Element::Value(b)) => {
                a.is_alpha_equivalent(b)
                    && renaming.bind(a.var(), b.var())
                    && match (a.operand(), b.operand()) {
                        (Operand::Var(x), Operand::Var(y)) => renaming.bind(x, y),
                        _ => true,
                    }
            }
            (Element::Id(a), Element::Id(b)) => a.is_alpha_equivalent(b) && renaming.bind(a.var(), b.var()),
            _ => false,
        }
    }

    fn alpha_hash(&self) -> u64 {
        match self {
            Element::Role(role, _) => {
                let mut hasher = DefaultHasher::new();
                "role".hash(&mut hasher);
                role.hash(&mut hasher);
                hasher.finish()
            }
            Element::Value(p) => p.alpha_equivalence_hash(),
            Element::Id(p) => p.alpha_equivalence_hash(),
        }
    }
}

/// Backtracking search for a bijection between two element multisets.
fn match_elements(left: &[Element<'_>], right: &[Element<'_>], used: &mut [bool], renaming: &Renaming) -> bool {
    let Some((first, rest)) = left.split_first() else {
        return true;
    };
    for (i, candidate) in right.iter().enumerate() {
        if used[i] {
            continue;
        }
        let mut attempt = renaming.clone();
        if first.unify(candidate, &mut attempt) {
            used[i] = true;
            if match_elements(rest, right, used, &attempt) {
                return true;
            }
            used[i] = false;
        }
    }
    false
}

impl Atom {
    fn elements(&self) -> Vec<Element<'_>> {
        let mut out: Vec<Element<'_>> = self
            .role_players()
            .iter()
            .map(|rp| Element::Role(rp.role, &rp.player))
            .collect();
        out.extend(self.value_predicates().iter().map(Element::Value));
        out.extend(self.id_predicates.iter().map(Element::Id));
        out
    }

    /// The renaming-independent skeleton: kind, type and the naming of the
    /// secondary and relation variables.
    fn skeleton_matches(&self, other: &Atom, renaming: &mut Renaming) -> bool {
        if self.tag() != other.tag() || self.type_id != other.type_id {
            return false;
        }
        if !renaming.bind(&self.var, &other.var) {
            return false;
        }
        match (&self.kind, &other.kind) {
            (AtomKind::Isa { type_var: a }, AtomKind::Isa { type_var: b })
            | (
                AtomKind::Relationship { type_var: a, .. },
                AtomKind::Relationship { type_var: b, .. },
            ) => renaming.bind_if_named(a, b),
            (
                AtomKind::Resource {
                    value_var: v1,
                    relation_var: r1,
                    ..
                },
                AtomKind::Resource {
                    value_var: v2,
                    relation_var: r2,
                    ..
                },
            ) => renaming.bind(v1, v2) && renaming.bind_if_named(r1, r2),
            _ => false,
        }
    }

    /// Structural equality up to a consistent, bijective renaming of variables.
    pub fn is_alpha_equivalent(&self, other: &Atom) -> bool {
        let mut renaming = Renaming::default();
        if !self.skeleton_matches(other, &mut renaming) {
            return false;
        }
        let left = self.elements();
        let right = other.elements();
        if left.len() != right.len() {
            return false;
        }
        let mut used = vec![false; right.len()];
        match_elements(&left, &right, &mut used, &renaming)
    }

    /// Hash consistent with [`Atom::is_alpha_equivalent`].
    pub fn alpha_equivalence_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tag().hash(&mut hasher);
        self.type_id.hash(&mut hasher);
        match &self.kind {
            AtomKind::Isa { type_var } | AtomKind::Relationship { type_var, .. } => {
                type_var.is_user_defined().hash(&mut hasher);
            }
            AtomKind::Resource { relation_var, .. } => {
                relation_var.is_user_defined().hash(&mut hasher);
            }
        }
        let mut element_hashes: Vec<u64> = self.elements().iter().map(Element::alpha_hash).collect();
        element_hashes.sort_unstable();
        element_hashes.hash(&mut hasher);
        hasher.finish()
    }
}

/// Multiset equality of predicates under their own alpha-equivalence.
fn predicate_multiset_eq<T>(left: &[T], right: &[T], equivalent: impl Fn(&T, &T) -> bool) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut used = vec![false; right.len()];
    left.iter().all(|l| {
        match right
            .iter()
            .enumerate()
            .find(|(i, r)| !used[*i] && equivalent(l, r))
        {
            Some((i, _)) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        let mut left_roles = self.role_players().to_vec();
        let mut right_roles = other.role_players().to_vec();
        left_roles.sort_by(|a, b| (a.role, &a.player).cmp(&(b.role, &b.player)));
        right_roles.sort_by(|a, b| (a.role, &a.player).cmp(&(b.role, &b.player)));
        self.tag() == other.tag()
            && self.type_id == other.type_id
            && self.var == other.var
            && left_roles == right_roles
            && predicate_multiset_eq(self.value_predicates(), other.value_predicates(), |a, b| {
                a.is_alpha_equivalent(b)
            })
            && predicate_multiset_eq(&self.id_predicates, &other.id_predicates, |a, b| {
                a.is_alpha_equivalent(b)
            })
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        self.type_id.hash(state);
        self.var.hash(state);
        let mut roles: Vec<(Option<ConceptId>, &Var)> = self
            .role_players()
            .iter()
            .map(|rp| (rp.role, &rp.player))
            .collect();
        roles.sort();
        roles.hash(state);
        let value_sum = self
            .value_predicates()
            .iter()
            .fold(0u64, |acc, p| acc.wrapping_add(p.alpha_equivalence_hash()));
        let id_sum = self
            .id_predicates
            .iter()
            .fold(0u64, |acc, p| acc.wrapping_add(p.alpha_equivalence_hash()));
        value_sum.hash(state);
        id_sum.hash(state);
    }
}

/// An atom keyed by its alpha-equivalence class.
#[derive(Debug, Clone)]
pub struct AlphaKey {
    atom: Atom,
    hash: u64,
}

impl AlphaKey {
    pub fn new(atom: &Atom) -> Self {
        Self {
            hash: atom.alpha_equivalence_hash(),
            atom: atom.clone(),
        }
    }

    pub fn atom(&self) -> &Atom {
        &self.atom
    }
}

impl PartialEq for AlphaKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.atom.is_alpha_equivalent(&other.atom)
    }
}

impl Eq for AlphaKey {}

impl Hash for AlphaKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
