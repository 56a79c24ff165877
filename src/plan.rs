//! Resolution planning: in which order to resolve the atoms of a query.
//!
//! Every atom gets an additive integer priority given the variables already bound
//! when it would be resolved. **Higher priority resolves earlier**: every weight
//! below is a bonus, so binding more of an atom's variables never lowers it.
//! The plan only affects cost, never the answers.
//!
//! Attribute atoms are penalised when their pattern is a *supernode*: a pattern
//! with more than `threshold` matches, detected by a capped `skip + next` probe
//! into the store instead of a full count, and optionally memoised per pattern.

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::answer::Answer;
use crate::atom::{AlphaKey, Atom, AtomKind};
use crate::predicate::{Comparator, Operand, ValuePredicate};
use crate::query::ReasonerQuery;
use crate::store::GraphStore;
use crate::var::Var;

/// Base priority of a type-membership atom.
pub const ISA_ATOM: i32 = 0;
/// Base priority of a relationship atom.
pub const RELATIONSHIP_ATOM: i32 = 5;
/// Base priority of an attribute-ownership atom, before the resource bonus.
pub const RESOURCE_ATOM: i32 = 0;
/// Bonus for being an attribute-ownership atom.
pub const IS_RESOURCE_ATOM: i32 = 10;
/// Bonus per atom variable already bound.
pub const BOUND_VARIABLE: i32 = 5;
/// Bonus per id predicate.
pub const SPECIFIC_ID_PREDICATE: i32 = 30;
/// Value predicate pinning a concrete value, or one whose variables are bound.
pub const SPECIFIC_VALUE_PREDICATE: i32 = 20;
/// Equality against a variable that is not yet bound.
pub const VARIABLE_EQUALITY: i32 = 8;
/// Comparison against a variable that is not yet bound.
pub const VARIABLE_COMPARISON: i32 = 4;
/// Comparison against a literal.
pub const NON_SPECIFIC_VALUE_PREDICATE: i32 = 2;
/// No usable constraint on the value.
pub const UNCONSTRAINED_VALUE: i32 = 0;
/// Bonus for an attribute owned by a relationship of the same query.
pub const RESOURCE_REIFYING_RELATION: i32 = 15;

// ---------------------------------------------------------------------------
// Supernode probe
// ---------------------------------------------------------------------------

/// Capped supernode detection with optional per-pattern memoisation.
pub struct SupernodeProbe<'s> {
    store: &'s dyn GraphStore,
    threshold: usize,
    memoize: bool,
    cache: DashMap<AlphaKey, bool>,
    probes: AtomicUsize,
}

impl<'s> SupernodeProbe<'s> {
    pub fn new(store: &'s dyn GraphStore, threshold: usize, memoize: bool) -> Self {
        Self {
            store,
            threshold,
            memoize,
            cache: DashMap::new(),
            probes: AtomicUsize::new(0),
        }
    }

    /// Whether `atom`'s pattern, unbound, has more than `threshold` matches.
    pub fn is_supernode(&self, atom: &Atom) -> bool {
        if !self.memoize {
            return self.probe(atom);
        }
        let key = AlphaKey::new(atom);
        if let Some(hit) = self.cache.get(&key) {
            return *hit.value();
        }
        *self.cache.entry(key).or_insert_with(|| self.probe(atom))
    }

    fn probe(&self, atom: &Atom) -> bool {
        self.probes.fetch_add(1, Ordering::Relaxed);
        let supernode = self
            .store
            .match_atom(atom, &Answer::empty())
            .nth(self.threshold)
            .is_some();
        tracing::debug!(atom = %atom.display(self.store), threshold = self.threshold, supernode, "supernode probe");
        supernode
    }

    /// Number of store probes performed so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for SupernodeProbe<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupernodeProbe")
            .field("threshold", &self.threshold)
            .field("memoize", &self.memoize)
            .field("cached", &self.cache.len())
            .field("probes", &self.probe_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

fn value_predicate_bonus(
    atom: &Atom,
    predicate: &ValuePredicate,
    bound: &BTreeSet<Var>,
    supernode: &dyn Fn() -> bool,
) -> i32 {
    match predicate.operand() {
        Operand::Literal(_) if predicate.is_specific() && !supernode() => SPECIFIC_VALUE_PREDICATE,
        Operand::Literal(_) => NON_SPECIFIC_VALUE_PREDICATE,
        Operand::Var(inner) => {
            if (bound.contains(atom.var()) || bound.contains(inner)) && !supernode() {
                SPECIFIC_VALUE_PREDICATE
            } else if predicate.comparator() == Comparator::Eq {
                VARIABLE_EQUALITY
            } else {
                VARIABLE_COMPARISON
            }
        }
    }
}

impl Atom {
    /// Evaluation priority of this atom among `siblings` (the atoms of its
    /// query) once the variables in `bound` are bound.
    pub fn compute_priority(&self, siblings: &[Atom], bound: &BTreeSet<Var>, probe: &SupernodeProbe<'_>) -> i32 {
        let mut priority = match self.kind() {
            AtomKind::Isa { .. } => ISA_ATOM,
            AtomKind::Relationship { .. } => RELATIONSHIP_ATOM,
            AtomKind::Resource { .. } => RESOURCE_ATOM,
        };
        let bound_vars = self.var_names().iter().filter(|v| bound.contains(*v)).count();
        priority += BOUND_VARIABLE * bound_vars as i32;
        priority += SPECIFIC_ID_PREDICATE * self.id_predicates().len() as i32;

        if !self.is_resource() {
            return priority;
        }
        priority += IS_RESOURCE_ATOM;

        let cell = OnceCell::new();
        let supernode = || *cell.get_or_init(|| probe.is_supernode(self));
        let predicates = self.value_predicates();
        if predicates.is_empty() {
            let owner_or_value_bound = bound.contains(self.var()) || bound.contains(self.predicate_var());
            priority += if owner_or_value_bound && !supernode() {
                SPECIFIC_VALUE_PREDICATE
            } else {
                UNCONSTRAINED_VALUE
            };
        } else {
            let total: i32 = predicates
                .iter()
                .map(|p| value_predicate_bonus(self, p, bound, &supernode))
                .sum();
            priority += total / predicates.len() as i32;
        }

        let reifies_relation = siblings
            .iter()
            .any(|other| other.is_relationship() && other.var() == self.var());
        if reifies_relation {
            priority += RESOURCE_REIFYING_RELATION;
        }
        priority
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One atom of a plan with the priority it was picked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub atom_index: usize,
    pub priority: i32,
}

/// Greedy evaluation order: repeatedly pick the highest-priority remaining atom
/// given what the atoms before it bind. Ties go to the earlier atom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    steps: Vec<PlanStep>,
}

impl ResolutionPlan {
    /// Plan `atoms` with the variables of `initial` already bound.
    pub fn for_atoms(atoms: &[Atom], initial: &Answer, probe: &SupernodeProbe<'_>) -> Self {
        let mut bound: BTreeSet<Var> = initial.vars();
        let mut remaining: Vec<usize> = (0..atoms.len()).collect();
        let mut steps = Vec::with_capacity(atoms.len());
        while !remaining.is_empty() {
            let mut best: Option<(usize, i32)> = None;
            for (slot, &index) in remaining.iter().enumerate() {
                let priority = atoms[index].compute_priority(atoms, &bound, probe);
                tracing::debug!(atom = %atoms[index].display(probe.store), priority, "atom priority");
                if best.is_none_or(|(_, p)| priority > p) {
                    best = Some((slot, priority));
                }
            }
            let Some((slot, priority)) = best else {
                break;
            };
            let index = remaining.remove(slot);
            bound.extend(atoms[index].var_names());
            steps.push(PlanStep {
                atom_index: index,
                priority,
            });
        }
        Self { steps }
    }

    /// Plan a query under its own substitution.
    pub fn new(query: &ReasonerQuery, probe: &SupernodeProbe<'_>) -> Self {
        Self::for_atoms(query.atoms(), query.substitution(), probe)
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Atom indices in resolution order.
    pub fn order(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.atom_index).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render the plan against the atoms it was computed for.
    pub fn describe(&self, atoms: &[Atom], store: &dyn GraphStore) -> String {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| {
                atoms
                    .get(step.atom_index)
                    .map(|atom| format!("{:>3}. [{:>3}] {}", i + 1, step.priority, atom.display(store)))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::RolePlayer;
    use crate::concept::{ConceptId, Value, ValueType};
    use crate::store::MemGraph;

    fn people(count: usize) -> (MemGraph, ConceptId) {
        let g = MemGraph::new();
        let person = g.define_entity_type("person", None).unwrap();
        let age = g.define_attribute_type("age", ValueType::Long, None).unwrap();
        g.define_owns("person", "age").unwrap();
        let thirty = g.insert_attribute(age, Value::Long(30)).unwrap();
        for _ in 0..count {
            let p = g.insert_entity(person).unwrap();
            g.insert_has(p, thirty).unwrap();
        }
        (g, age)
    }

    fn age_30(age: ConceptId) -> Atom {
        let a = Var::named("a");
        Atom::resource(Var::named("x"), Some(age), a.clone(), vec![ValuePredicate::equals(a, 30)]).unwrap()
    }

    fn bound(names: &[&str]) -> BTreeSet<Var> {
        names.iter().map(|n| Var::named(*n)).collect()
    }

    #[test]
    fn specific_value_beats_supernode() {
        let (small, age) = people(2);
        let (big, big_age) = people(10);
        let small_probe = SupernodeProbe::new(&small, 5, true);
        let big_probe = SupernodeProbe::new(&big, 5, true);
        let small_atom = age_30(age);
        let big_atom = age_30(big_age);
        let p_small = small_atom.compute_priority(&[], &BTreeSet::new(), &small_probe);
        let p_big = big_atom.compute_priority(&[], &BTreeSet::new(), &big_probe);
        assert_eq!(p_small, RESOURCE_ATOM + IS_RESOURCE_ATOM + SPECIFIC_VALUE_PREDICATE);
        assert_eq!(p_big, RESOURCE_ATOM + IS_RESOURCE_ATOM + NON_SPECIFIC_VALUE_PREDICATE);
    }

    #[test]
    fn bonuses_are_averaged() {
        let (g, age) = people(1);
        let probe = SupernodeProbe::new(&g, 5, true);
        let a = Var::named("a");
        let atom = Atom::resource(
            Var::named("x"),
            Some(age),
            a.clone(),
            vec![
                ValuePredicate::equals(a.clone(), 30),
                ValuePredicate::compare(a, Comparator::Gt, 10),
            ],
        )
        .unwrap();
        let expected = IS_RESOURCE_ATOM + (SPECIFIC_VALUE_PREDICATE + NON_SPECIFIC_VALUE_PREDICATE) / 2;
        assert_eq!(atom.compute_priority(&[], &BTreeSet::new(), &probe), expected);
    }

    #[test]
    fn inner_variable_predicates() {
        let (g, age) = people(1);
        let probe = SupernodeProbe::new(&g, 5, true);
        let a = Var::named("a");
        let eq = Atom::resource(
            Var::named("x"),
            Some(age),
            a.clone(),
            vec![ValuePredicate::against(a.clone(), Comparator::Eq, Var::named("b"))],
        )
        .unwrap();
        let lt = Atom::resource(
            Var::named("x"),
            Some(age),
            a.clone(),
            vec![ValuePredicate::against(a, Comparator::Lt, Var::named("b"))],
        )
        .unwrap();
        let none = BTreeSet::new();
        assert_eq!(eq.compute_priority(&[], &none, &probe), IS_RESOURCE_ATOM + VARIABLE_EQUALITY);
        assert_eq!(lt.compute_priority(&[], &none, &probe), IS_RESOURCE_ATOM + VARIABLE_COMPARISON);
        let b = bound(&["b"]);
        assert_eq!(
            lt.compute_priority(&[], &b, &probe),
            IS_RESOURCE_ATOM + BOUND_VARIABLE + SPECIFIC_VALUE_PREDICATE
        );
    }

    #[test]
    fn binding_more_never_lowers_priority() {
        let (g, age) = people(8);
        let probe = SupernodeProbe::new(&g, 5, true);
        let atom = Atom::resource(Var::named("x"), Some(age), Var::named("a"), vec![]).unwrap();
        let p0 = atom.compute_priority(&[], &bound(&[]), &probe);
        let p1 = atom.compute_priority(&[], &bound(&["x"]), &probe);
        let p2 = atom.compute_priority(&[], &bound(&["x", "a"]), &probe);
        assert!(p0 <= p1 && p1 <= p2);
    }

    #[test]
    fn reified_relation_bonus() {
        let (g, age) = people(1);
        let probe = SupernodeProbe::new(&g, 5, true);
        let owned = Atom::resource(Var::named("m"), Some(age), Var::named("a"), vec![]).unwrap();
        let rel = Atom::relationship(
            Var::named("m"),
            None,
            vec![RolePlayer::new(None, Var::named("x"))],
        );
        let siblings = vec![owned.clone(), rel];
        let with = owned.compute_priority(&siblings, &BTreeSet::new(), &probe);
        let without = owned.compute_priority(&[], &BTreeSet::new(), &probe);
        assert_eq!(with - without, RESOURCE_REIFYING_RELATION);
    }

    #[test]
    fn supernode_status_is_memoised() {
        let (g, age) = people(3);
        let memo = SupernodeProbe::new(&g, 5, true);
        let atom = age_30(age);
        let renamed = Atom::resource(
            Var::named("y"),
            Some(age),
            Var::named("b"),
            vec![ValuePredicate::equals(Var::named("b"), 30)],
        )
        .unwrap();
        assert!(!memo.is_supernode(&atom));
        assert!(!memo.is_supernode(&atom));
        assert!(!memo.is_supernode(&renamed));
        assert_eq!(memo.probe_count(), 1);

        let fresh = SupernodeProbe::new(&g, 5, false);
        fresh.is_supernode(&atom);
        fresh.is_supernode(&atom);
        assert_eq!(fresh.probe_count(), 2);
    }

    #[test]
    fn plan_prefers_specific_atoms_first() {
        let (g, age) = people(2);
        let probe = SupernodeProbe::new(&g, 5, true);
        let person = g.schema_concept("person");
        let atoms = vec![Atom::isa(Var::named("x"), person), age_30(age)];
        let plan = ResolutionPlan::for_atoms(&atoms, &Answer::empty(), &probe);
        assert_eq!(plan.order(), vec![1, 0]);
        // Once the attribute atom bound $x, the isa atom gains the bound bonus.
        assert_eq!(plan.steps()[1].priority, ISA_ATOM + BOUND_VARIABLE);
        assert!(plan.describe(&atoms, &g).contains("isa person"));
    }
}
