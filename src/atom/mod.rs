//! Atoms: typed graph-pattern fragments over query variables.
//!
//! An [`Atom`] is one of three closed kinds ([`AtomKind`]):
//!
//! - **Isa**: `$x isa person`: type membership
//! - **Relationship**: `$r (spouse: $x, spouse: $y) isa marriage`
//! - **Resource**: `$x has age 30`: attribute ownership, with an optional set of
//!   value predicates and a relation variable naming the implicit ownership edge
//!
//! Fields shared by every kind live on [`Atom`]; kind-specific fields live in the
//! variant payload. Atoms never hold a reference to their query: an atom inserted
//! into a [`crate::query::QueryArena`] records its owner's [`QueryId`]. Atoms are
//! immutable once built; rewrites return new atoms.

mod applicability;
mod equivalence;
mod materialise;
mod rewrite;
mod unify;
mod validate;

use std::collections::BTreeSet;

use crate::answer::Answer;
use crate::concept::ConceptId;
use crate::error::{AtomError, AtomResult};
use crate::predicate::{IdPredicate, ValuePredicate};
use crate::query::QueryId;
use crate::store::GraphStore;
use crate::unifier::Unifier;
use crate::var::Var;

pub use equivalence::AlphaKey;

/// A role played by a variable inside a relationship atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RolePlayer {
    /// The role, or `None` when any role matches.
    pub role: Option<ConceptId>,
    pub player: Var,
}

impl RolePlayer {
    pub fn new(role: Option<ConceptId>, player: Var) -> Self {
        Self { role, player }
    }
}

/// Kind-specific payload of an atom.
#[derive(Debug, Clone)]
pub enum AtomKind {
    /// `$var isa <type>`; `type_var` holds the type itself.
    Isa { type_var: Var },
    /// `$var (<role>: $player, ...) isa <type>`.
    Relationship {
        type_var: Var,
        role_players: Vec<RolePlayer>,
    },
    /// `$var has <type> $value_var`, constrained by value predicates on the value.
    Resource {
        value_var: Var,
        relation_var: Var,
        predicates: Vec<ValuePredicate>,
    },
}

/// Discriminant of [`AtomKind`], used for hashing and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomTag {
    Isa,
    Relationship,
    Resource,
}

impl std::fmt::Display for AtomTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomTag::Isa => write!(f, "isa"),
            AtomTag::Relationship => write!(f, "relationship"),
            AtomTag::Resource => write!(f, "resource"),
        }
    }
}

/// A typed graph-pattern fragment.
#[derive(Debug, Clone)]
pub struct Atom {
    owner: Option<QueryId>,
    var: Var,
    type_id: Option<ConceptId>,
    id_predicates: Vec<IdPredicate>,
    kind: AtomKind,
}

impl Atom {
    /// `$var isa <type_id>`.
    pub fn isa(var: Var, type_id: Option<ConceptId>) -> Self {
        Self {
            owner: None,
            var,
            type_id,
            id_predicates: Vec::new(),
            kind: AtomKind::Isa {
                type_var: Var::fresh(),
            },
        }
    }

    /// `$var (role: $player, ...) isa <type_id>`.
    pub fn relationship(var: Var, type_id: Option<ConceptId>, role_players: Vec<RolePlayer>) -> Self {
        Self {
            owner: None,
            var,
            type_id,
            id_predicates: Vec::new(),
            kind: AtomKind::Relationship {
                type_var: Var::fresh(),
                role_players,
            },
        }
    }

    /// `$owner has <type_id> $value_var` with value predicates on `$value_var`.
    ///
    /// Fails if two equality predicates pin the same variable to different literals.
    pub fn resource(
        owner: Var,
        type_id: Option<ConceptId>,
        value_var: Var,
        predicates: Vec<ValuePredicate>,
    ) -> AtomResult<Self> {
        for (i, p) in predicates.iter().enumerate() {
            for q in &predicates[i + 1..] {
                if p.var() == q.var()
                    && let (Some(a), Some(b)) = (p.equals_value(), q.equals_value())
                    && a != b
                {
                    return Err(AtomError::InconsistentPredicates {
                        var: p.var().to_string(),
                        first: a.to_string(),
                        second: b.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            owner: None,
            var: owner,
            type_id,
            id_predicates: Vec::new(),
            kind: AtomKind::Resource {
                value_var,
                relation_var: Var::fresh(),
                predicates,
            },
        })
    }

    /// Name the implicit ownership edge of a resource atom. No-op for other kinds.
    pub fn with_relation_var(mut self, relation: Var) -> Self {
        if let AtomKind::Resource { relation_var, .. } = &mut self.kind {
            *relation_var = relation;
        }
        self
    }

    /// Replace the type-holder variable of an isa or relationship atom.
    pub fn with_type_var(mut self, var: Var) -> Self {
        match &mut self.kind {
            AtomKind::Isa { type_var } | AtomKind::Relationship { type_var, .. } => *type_var = var,
            AtomKind::Resource { .. } => {}
        }
        self
    }

    pub fn with_id_predicate(mut self, predicate: IdPredicate) -> Self {
        self.id_predicates.push(predicate);
        self
    }

    pub(crate) fn adopt(mut self, owner: QueryId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// The query owning this atom, once inserted into an arena.
    pub fn owner(&self) -> Option<QueryId> {
        self.owner
    }

    /// The primary variable: instance, relationship, or attribute owner.
    pub fn var(&self) -> &Var {
        &self.var
    }

    pub fn type_id(&self) -> Option<ConceptId> {
        self.type_id
    }

    pub fn kind(&self) -> &AtomKind {
        &self.kind
    }

    pub fn tag(&self) -> AtomTag {
        match self.kind {
            AtomKind::Isa { .. } => AtomTag::Isa,
            AtomKind::Relationship { .. } => AtomTag::Relationship,
            AtomKind::Resource { .. } => AtomTag::Resource,
        }
    }

    pub fn id_predicates(&self) -> &[IdPredicate] {
        &self.id_predicates
    }

    /// The secondary variable: the type holder, or the attribute for resources.
    pub fn predicate_var(&self) -> &Var {
        match &self.kind {
            AtomKind::Isa { type_var } | AtomKind::Relationship { type_var, .. } => type_var,
            AtomKind::Resource { value_var, .. } => value_var,
        }
    }

    pub fn relation_var(&self) -> Option<&Var> {
        match &self.kind {
            AtomKind::Resource { relation_var, .. } => Some(relation_var),
            _ => None,
        }
    }

    /// Value predicates of a resource atom; empty for other kinds.
    pub fn value_predicates(&self) -> &[ValuePredicate] {
        match &self.kind {
            AtomKind::Resource { predicates, .. } => predicates,
            _ => &[],
        }
    }

    /// Role players of a relationship atom; empty for other kinds.
    pub fn role_players(&self) -> &[RolePlayer] {
        match &self.kind {
            AtomKind::Relationship { role_players, .. } => role_players,
            _ => &[],
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.kind, AtomKind::Resource { .. })
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, AtomKind::Relationship { .. })
    }

    pub fn is_isa(&self) -> bool {
        matches!(self.kind, AtomKind::Isa { .. })
    }

    /// Whether the atom's ownership edge is named by the user.
    pub fn is_user_defined(&self) -> bool {
        self.relation_var().is_some_and(Var::is_user_defined)
    }

    /// Every variable this atom constrains.
    ///
    /// Anonymous type holders and anonymous relation variables are left out: they
    /// never appear in answers.
    pub fn var_names(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        vars.insert(self.var.clone());
        match &self.kind {
            AtomKind::Isa { type_var } => {
                if type_var.is_user_defined() {
                    vars.insert(type_var.clone());
                }
            }
            AtomKind::Relationship {
                type_var,
                role_players,
            } => {
                if type_var.is_user_defined() {
                    vars.insert(type_var.clone());
                }
                vars.extend(role_players.iter().map(|rp| rp.player.clone()));
            }
            AtomKind::Resource {
                value_var,
                relation_var,
                predicates,
            } => {
                vars.insert(value_var.clone());
                vars.extend(predicates.iter().flat_map(|p| p.var_names().cloned()));
                if relation_var.is_user_defined() {
                    vars.insert(relation_var.clone());
                }
            }
        }
        vars.extend(self.id_predicates.iter().map(|p| p.var().clone()));
        vars
    }

    /// Rename every variable through `unifier`.
    pub fn apply_unifier(&self, unifier: &Unifier) -> Atom {
        let kind = match &self.kind {
            AtomKind::Isa { type_var } => AtomKind::Isa {
                type_var: unifier.apply(type_var),
            },
            AtomKind::Relationship {
                type_var,
                role_players,
            } => AtomKind::Relationship {
                type_var: unifier.apply(type_var),
                role_players: role_players
                    .iter()
                    .map(|rp| RolePlayer::new(rp.role, unifier.apply(&rp.player)))
                    .collect(),
            },
            AtomKind::Resource {
                value_var,
                relation_var,
                predicates,
            } => AtomKind::Resource {
                value_var: unifier.apply(value_var),
                relation_var: unifier.apply(relation_var),
                predicates: predicates.iter().map(|p| p.apply_unifier(unifier)).collect(),
            },
        };
        Atom {
            owner: self.owner,
            var: unifier.apply(&self.var),
            type_id: self.type_id,
            id_predicates: self
                .id_predicates
                .iter()
                .map(|p| p.apply_unifier(unifier))
                .collect(),
            kind,
        }
    }

    /// The atom with an id predicate for every one of its variables bound in
    /// `answer`. Two such atoms are alpha-equivalent exactly when they denote the
    /// same subgoal.
    pub fn with_substitution(&self, answer: &Answer) -> Atom {
        let mut atom = self.clone();
        for var in self.var_names() {
            if let Some(id) = answer.get(&var)
                && !atom.id_predicates.iter().any(|p| p.var() == &var)
            {
                atom.id_predicates.push(IdPredicate::new(var, id));
            }
        }
        atom
    }
}

impl Atom {
    /// Render with schema labels from `store`: `$x has age 30` rather than the
    /// bare type ids of the plain `Display`.
    pub fn display<'a>(&'a self, store: &'a dyn GraphStore) -> AtomDisplay<'a> {
        AtomDisplay { atom: self, store }
    }

    fn write_with(&self, f: &mut std::fmt::Formatter<'_>, name: &dyn Fn(ConceptId) -> String) -> std::fmt::Result {
        let type_str = self.type_id.map(name).unwrap_or_else(|| "?".to_string());
        match &self.kind {
            AtomKind::Isa { .. } => write!(f, "{} isa {type_str}", self.var)?,
            AtomKind::Relationship { role_players, .. } => {
                write!(f, "{} (", self.var)?;
                for (i, rp) in role_players.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match rp.role {
                        Some(role) => write!(f, "{}: {}", name(role), rp.player)?,
                        None => write!(f, "{}", rp.player)?,
                    }
                }
                write!(f, ") isa {type_str}")?;
            }
            AtomKind::Resource {
                value_var,
                relation_var,
                predicates,
            } => {
                write!(f, "{} has {type_str} ", self.var)?;
                if predicates.is_empty() {
                    write!(f, "{value_var}")?;
                } else {
                    let preds: Vec<String> = predicates.iter().map(|p| p.to_string()).collect();
                    write!(f, "{}", preds.join(" "))?;
                }
                if relation_var.is_user_defined() {
                    write!(f, "({relation_var})")?;
                }
            }
        }
        for p in &self.id_predicates {
            write!(f, "; {p}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_with(f, &|id| id.to_string())
    }
}

/// An atom rendered with labels, see [`Atom::display`].
pub struct AtomDisplay<'a> {
    atom: &'a Atom,
    store: &'a dyn GraphStore,
}

impl std::fmt::Display for AtomDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.atom
            .write_with(f, &|id| self.store.label(id).unwrap_or_else(|| id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Comparator;

    fn id(n: u64) -> ConceptId {
        ConceptId::new(n).unwrap()
    }

    #[test]
    fn resource_rejects_contradictory_equalities() {
        let a = Var::named("a");
        let err = Atom::resource(
            Var::named("x"),
            Some(id(1)),
            a.clone(),
            vec![ValuePredicate::equals(a.clone(), 30), ValuePredicate::equals(a, 40)],
        )
        .unwrap_err();
        assert!(matches!(err, AtomError::InconsistentPredicates { .. }));
    }

    #[test]
    fn resource_accepts_repeated_equal_literal_and_comparisons() {
        let a = Var::named("a");
        let atom = Atom::resource(
            Var::named("x"),
            Some(id(1)),
            a.clone(),
            vec![
                ValuePredicate::equals(a.clone(), 30),
                ValuePredicate::equals(a.clone(), 30),
                ValuePredicate::compare(a, Comparator::Gt, 10),
            ],
        );
        assert!(atom.is_ok());
    }

    #[test]
    fn var_names_skip_anonymous_relation_var() {
        let a = Var::named("a");
        let atom = Atom::resource(
            Var::named("x"),
            Some(id(1)),
            a.clone(),
            vec![ValuePredicate::against(a, Comparator::Lt, Var::named("b"))],
        )
        .unwrap();
        let names: Vec<String> = atom.var_names().iter().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["$a", "$b", "$x"]);

        let named = atom.with_relation_var(Var::named("r"));
        assert!(named.var_names().contains(&Var::named("r")));
        assert!(named.is_user_defined());
    }

    #[test]
    fn relationship_var_names_include_players() {
        let atom = Atom::relationship(
            Var::named("m"),
            Some(id(4)),
            vec![
                RolePlayer::new(Some(id(5)), Var::named("x")),
                RolePlayer::new(Some(id(5)), Var::named("y")),
            ],
        );
        assert_eq!(atom.var_names().len(), 3);
        assert_eq!(atom.role_players().len(), 2);
        assert!(atom.value_predicates().is_empty());
    }

    #[test]
    fn apply_unifier_renames_everything() {
        let atom = Atom::resource(
            Var::named("x"),
            Some(id(1)),
            Var::named("a"),
            vec![ValuePredicate::equals(Var::named("a"), 30)],
        )
        .unwrap()
        .with_relation_var(Var::named("r"));
        let u = Unifier::from_pairs([
            (Var::named("x"), Var::named("p")),
            (Var::named("a"), Var::named("v")),
            (Var::named("r"), Var::named("s")),
        ]);
        let renamed = atom.apply_unifier(&u);
        assert_eq!(renamed.var(), &Var::named("p"));
        assert_eq!(renamed.predicate_var(), &Var::named("v"));
        assert_eq!(renamed.relation_var(), Some(&Var::named("s")));
        assert_eq!(renamed.value_predicates()[0].var(), &Var::named("v"));
    }

    #[test]
    fn with_substitution_pins_bound_vars() {
        let atom = Atom::isa(Var::named("x"), Some(id(1)));
        let bound = atom.with_substitution(&Answer::from_pairs([(Var::named("x"), id(9))]));
        assert_eq!(bound.id_predicates().len(), 1);
        assert_eq!(bound.id_predicates()[0].concept(), id(9));
    }

    #[test]
    fn display_resource() {
        let atom = Atom::resource(
            Var::named("x"),
            Some(id(3)),
            Var::named("a"),
            vec![ValuePredicate::equals(Var::named("a"), 30)],
        )
        .unwrap()
        .with_relation_var(Var::named("r"));
        assert_eq!(atom.to_string(), "$x has V3 30($r)");
    }

    #[test]
    fn display_with_schema_labels() {
        use crate::concept::ValueType;
        use crate::store::MemGraph;

        let g = MemGraph::new();
        let age = g.define_attribute_type("age", ValueType::Long, None).unwrap();
        let marriage = g.define_relation_type("marriage", &["spouse"], None).unwrap();
        let spouse = g.require("spouse").unwrap();

        let a = Var::named("a");
        let owned = Atom::resource(Var::named("x"), Some(age), a.clone(), vec![ValuePredicate::equals(a, 30)])
            .unwrap()
            .with_relation_var(Var::named("r"));
        assert_eq!(owned.display(&g).to_string(), "$x has age 30($r)");

        let older = Atom::resource(
            Var::named("x"),
            Some(age),
            Var::named("b"),
            vec![ValuePredicate::compare(Var::named("b"), Comparator::Gte, 18)],
        )
        .unwrap();
        assert_eq!(older.display(&g).to_string(), "$x has age >= 18");

        let married = Atom::relationship(
            Var::named("m"),
            Some(marriage),
            vec![RolePlayer::new(Some(spouse), Var::named("x"))],
        );
        assert_eq!(married.display(&g).to_string(), "$m (spouse: $x) isa marriage");
    }
}
