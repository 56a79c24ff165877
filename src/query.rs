//! Reasoner queries and the arena that owns them.
//!
//! A [`ReasonerQuery`] is an unordered conjunction of atoms sharing one variable
//! namespace, together with the substitution it is resolved under. Queries live
//! in a [`QueryArena`]; an atom inserted into the arena records the [`QueryId`]
//! of its query instead of holding a reference to it.

use std::collections::{BTreeMap, BTreeSet};

use crate::answer::Answer;
use crate::atom::{Atom, AtomKind};
use crate::concept::ConceptId;
use crate::error::{QueryError, QueryResult};
use crate::store::GraphStore;
use crate::var::Var;

/// Index of a query inside its [`QueryArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(usize);

impl QueryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// A conjunction of atoms resolved under a substitution.
#[derive(Debug, Clone)]
pub struct ReasonerQuery {
    id: QueryId,
    atoms: Vec<Atom>,
    substitution: Answer,
}

impl ReasonerQuery {
    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn substitution(&self) -> &Answer {
        &self.substitution
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Every variable constrained by some atom.
    pub fn var_names(&self) -> BTreeSet<Var> {
        self.atoms.iter().flat_map(Atom::var_names).collect()
    }

    /// Variable types and role constraints stated by this query's atoms.
    pub fn var_types(&self) -> VarTypes {
        VarTypes::of(&self.atoms)
    }
}

/// Statically known variable types of a conjunction, and the roles each
/// variable plays in its relationship atoms.
///
/// Isa and relationship atoms type their primary variable, resource atoms type
/// their value variable. The first atom typing a variable wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarTypes {
    types: BTreeMap<Var, ConceptId>,
    roles: BTreeMap<Var, BTreeSet<ConceptId>>,
}

impl VarTypes {
    pub fn of<'a>(atoms: impl IntoIterator<Item = &'a Atom>) -> Self {
        let mut types = BTreeMap::new();
        let mut roles: BTreeMap<Var, BTreeSet<ConceptId>> = BTreeMap::new();
        for atom in atoms {
            for rp in atom.role_players() {
                if let Some(role) = rp.role {
                    roles.entry(rp.player.clone()).or_default().insert(role);
                }
            }
            let Some(ty) = atom.type_id() else {
                continue;
            };
            let var = match atom.kind() {
                AtomKind::Isa { .. } | AtomKind::Relationship { .. } => atom.var(),
                AtomKind::Resource { value_var, .. } => value_var,
            };
            types.entry(var.clone()).or_insert(ty);
        }
        Self { types, roles }
    }

    pub fn get(&self, var: &Var) -> Option<ConceptId> {
        self.types.get(var).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether an instance of `ty` could play every role `var` plays. An
    /// unknown type is always compatible.
    pub fn is_type_role_compatible(&self, store: &dyn GraphStore, var: &Var, ty: Option<ConceptId>) -> bool {
        let (Some(ty), Some(roles)) = (ty, self.roles.get(var)) else {
            return true;
        };
        let candidates = store.subtypes(ty);
        roles
            .iter()
            .all(|role| candidates.iter().any(|t| store.plays(*t).contains(role)))
    }
}

/// Owner of every query and, through them, every atom.
#[derive(Debug, Default)]
pub struct QueryArena {
    queries: Vec<ReasonerQuery>,
}

impl QueryArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a query over `atoms` with an empty substitution.
    pub fn insert(&mut self, atoms: Vec<Atom>) -> QueryId {
        self.insert_with_substitution(atoms, Answer::empty())
    }

    /// Insert a query over `atoms`, resolved under `substitution`.
    pub fn insert_with_substitution(&mut self, atoms: Vec<Atom>, substitution: Answer) -> QueryId {
        let id = QueryId(self.queries.len());
        let atoms = atoms.into_iter().map(|a| a.adopt(id)).collect();
        self.queries.push(ReasonerQuery {
            id,
            atoms,
            substitution,
        });
        id
    }

    pub fn query(&self, id: QueryId) -> QueryResult<&ReasonerQuery> {
        self.queries
            .get(id.0)
            .ok_or(QueryError::NotFound { id: id.0 })
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
