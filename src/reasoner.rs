//! Backward-chaining resolution.
//!
//! [`Reasoner::resolve`] answers a query lazily: atoms are joined depth-first in
//! plan order, and for each atom every applicable rule is applied before the
//! store is matched. Applying a rule means
//!
//! 1. the applicability filter against the rule head,
//! 2. renaming the rule apart and rewriting the head into the form of the atom,
//! 3. unifying the head with the atom,
//! 4. resolving the rule body (recursively, under the bindings the atom carries),
//! 5. materialising the head for every body answer,
//! 6. mapping the conclusions back through the unifier.
//!
//! A subgoal already being expanded further up the stack is not expanded again;
//! instead rules are re-applied at the outer goal until nothing new is derived.
//! Together with `max_rule_depth` this bounds recursive rules.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::answer::Answer;
use crate::atom::{AlphaKey, Atom, AtomKind};
use crate::config::ReasonerConfig;
use crate::error::{QueryError, ReasonerResult};
use crate::plan::{ResolutionPlan, SupernodeProbe};
use crate::query::{QueryArena, QueryId, VarTypes};
use crate::rule::{InferenceRule, RuleSet};
use crate::store::{AnswerIter, GraphStore};
use crate::unifier::Unifier;
use crate::var::Var;

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Resolves queries of an arena against a store under a rule set.
pub struct Reasoner<'s> {
    store: &'s dyn GraphStore,
    arena: &'s QueryArena,
    rules: &'s RuleSet,
    config: ReasonerConfig,
    probe: SupernodeProbe<'s>,
}

impl<'s> Reasoner<'s> {
    pub fn new(store: &'s dyn GraphStore, arena: &'s QueryArena, rules: &'s RuleSet, config: ReasonerConfig) -> Self {
        let probe = SupernodeProbe::new(store, config.supernode_threshold, config.memoize_supernodes);
        Self {
            store,
            arena,
            rules,
            config,
            probe,
        }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// The supernode probe shared by every plan of this reasoner.
    pub fn probe(&self) -> &SupernodeProbe<'s> {
        &self.probe
    }

    /// The order in which `query`'s atoms will be resolved.
    pub fn plan(&self, query: QueryId) -> ReasonerResult<ResolutionPlan> {
        let query = self.arena.query(query)?;
        if query.is_empty() {
            return Err(QueryError::Empty.into());
        }
        let plan = ResolutionPlan::new(query, &self.probe);
        tracing::info!(query = %query.id(), order = ?plan.order(), "resolution plan");
        Ok(plan)
    }

    /// Validation messages for every rule with problems, keyed by rule label.
    pub fn validate_rules(&self) -> ReasonerResult<BTreeMap<String, BTreeSet<String>>> {
        self.rules.validate(self.arena, self.store)
    }

    /// Lazily resolve `query`. Answers bind the query's user-defined variables
    /// and are never repeated.
    pub fn resolve(&self, query: QueryId) -> ReasonerResult<Answers<'_, 's>> {
        let plan = self.plan(query)?;
        let query = self.arena.query(query)?;
        let atoms: Vec<Atom> = plan
            .order()
            .into_iter()
            .map(|i| query.atoms()[i].clone())
            .collect();
        let projection = query
            .var_names()
            .into_iter()
            .filter(Var::is_user_defined)
            .collect();
        let seed: AnswerIter<'s> = Box::new(std::iter::once(query.substitution().clone()));
        Ok(Answers {
            reasoner: self,
            atoms,
            types: query.var_types(),
            projection,
            stack: vec![seed],
            seen: HashSet::new(),
        })
    }

    /// Every answer to `atom` extending `partial`, after applying the rules that
    /// could conclude it. `types` are the variable types of the conjunction
    /// `atom` belongs to.
    ///
    /// Rule expansion runs to completion before this returns; the store match
    /// that follows is streamed.
    fn atom_answers(
        &self,
        atom: &Atom,
        types: &VarTypes,
        partial: &Answer,
        goals: &mut Vec<AlphaKey>,
        depth: usize,
    ) -> ReasonerResult<AnswerIter<'s>> {
        let mut partial = partial.clone();
        for predicate in atom.id_predicates() {
            match partial.extend(predicate.var().clone(), predicate.concept()) {
                Some(extended) => partial = extended,
                None => return Ok(Box::new(std::iter::empty())),
            }
        }

        let goal = AlphaKey::new(&atom.with_substitution(&partial));
        if goals.contains(&goal) {
            tracing::warn!(atom = %atom.display(self.store), depth, "subgoal already being expanded, cutting loop");
        } else if depth < self.config.max_rule_depth {
            goals.push(goal);
            let derived = self.expand_rules(atom, types, &partial, goals, depth);
            goals.pop();
            let derived = derived?;
            if derived > 0 {
                tracing::debug!(atom = %atom.display(self.store), depth, derived, "rules concluded atom");
            }
        } else {
            tracing::debug!(atom = %atom.display(self.store), depth, "rule depth exhausted, matching stored facts only");
        }

        // Every conclusion has been materialised, so the store now holds the
        // stored and the inferred facts alike.
        let mut seen = HashSet::new();
        Ok(Box::new(
            self.store
                .match_atom(atom, &partial)
                .filter(move |answer| seen.insert(answer.clone())),
        ))
    }

    /// Apply every rule to `atom` until a full pass derives nothing new.
    /// Returns the number of distinct conclusions.
    fn expand_rules(
        &self,
        atom: &Atom,
        types: &VarTypes,
        partial: &Answer,
        goals: &mut Vec<AlphaKey>,
        depth: usize,
    ) -> ReasonerResult<usize> {
        let mut derived = HashSet::new();
        loop {
            let mut grew = false;
            for rule in self.rules.iter() {
                for answer in self.apply_rule(rule, atom, types, partial, goals, depth)? {
                    grew |= derived.insert(answer);
                }
            }
            if !grew {
                return Ok(derived.len());
            }
        }
    }

    fn apply_rule(
        &self,
        rule: &InferenceRule,
        atom: &Atom,
        types: &VarTypes,
        partial: &Answer,
        goals: &mut Vec<AlphaKey>,
        depth: usize,
    ) -> ReasonerResult<Vec<Answer>> {
        let head = rule.head_atom(self.arena)?;
        let rule_types = rule.var_types(self.arena)?;
        if !atom.is_rule_applicable_via_atom(types, self.store, head, &rule_types) {
            return Ok(vec![]);
        }

        let body = rule.body_atoms(self.arena)?;
        let renaming = rename_apart(head, body);
        let body: Vec<Atom> = body.iter().map(|a| a.apply_unifier(&renaming)).collect();
        let head = head.apply_unifier(&renaming).rewrite_to_user_defined(atom);

        let (child, conclusion) = if atom.is_relationship() && head.is_resource() {
            let named = head.rewrite_with_relation_variable();
            (named.to_relationship_atom(self.store)?, named)
        } else {
            (head.clone(), head)
        };

        let unifier = match child.unifier(atom, self.config.merge_policy) {
            Ok(unifier) => unifier,
            Err(error) => {
                tracing::warn!(
                    rule = rule.label(),
                    atom = %atom.display(self.store),
                    %error,
                    "rule head does not unify, skipping rule"
                );
                return Ok(vec![]);
            }
        };

        let produced = produced_vars(&conclusion);
        let mut seed = Answer::empty();
        for var in child.var_names() {
            if produced.contains(&var) {
                continue;
            }
            if let Some(id) = partial.get(&unifier.apply(&var)) {
                match seed.extend(var, id) {
                    Some(extended) => seed = extended,
                    None => return Ok(vec![]),
                }
            }
        }

        tracing::debug!(rule = rule.label(), atom = %atom.display(self.store), %unifier, depth, "applying rule");
        let body_answers = self.resolve_conjunction(&body, &seed, goals, depth + 1)?;

        let parent_vars = atom.var_names();
        let mut derived = Vec::new();
        for body_answer in &body_answers {
            for concluded in conclusion.materialise(self.store, body_answer)? {
                let mapped = concluded
                    .unify(&unifier)
                    .and_then(|renamed| partial.merge(&renamed.project(&parent_vars)));
                if let Some(answer) = mapped {
                    derived.push(answer);
                }
            }
        }
        tracing::debug!(
            rule = rule.label(),
            atom = %atom.display(self.store),
            body_answers = body_answers.len(),
            derived = derived.len(),
            "applied rule"
        );
        Ok(derived)
    }

    /// Eagerly resolve a conjunction under `seed`. Used for rule bodies.
    fn resolve_conjunction(
        &self,
        atoms: &[Atom],
        seed: &Answer,
        goals: &mut Vec<AlphaKey>,
        depth: usize,
    ) -> ReasonerResult<Vec<Answer>> {
        let plan = ResolutionPlan::for_atoms(atoms, seed, &self.probe);
        let types = VarTypes::of(atoms);
        let mut partials = vec![seed.clone()];
        for index in plan.order() {
            let mut next = Vec::new();
            for partial in &partials {
                next.extend(self.atom_answers(&atoms[index], &types, partial, goals, depth)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            partials = next;
        }
        partials.retain(|answer| self.satisfies_inner_predicates(atoms, answer));
        Ok(partials)
    }

    /// Value comparisons between two variables can only be decided once both are
    /// bound; the store checks them when it can, this catches the rest.
    fn satisfies_inner_predicates(&self, atoms: &[Atom], answer: &Answer) -> bool {
        atoms.iter().flat_map(Atom::value_predicates).all(|predicate| {
            let Some(inner) = predicate.inner_var() else {
                return true;
            };
            let lhs = answer.get(predicate.var()).and_then(|id| self.store.value_of(id));
            let rhs = answer.get(inner).and_then(|id| self.store.value_of(id));
            match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => predicate.comparator().test(&lhs, &rhs),
                _ => true,
            }
        })
    }
}

impl std::fmt::Debug for Reasoner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reasoner")
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .field("probe", &self.probe)
            .finish()
    }
}

/// Fresh names for every variable of a rule, so its variables never collide
/// with those of the atom it is applied to or with another application of itself.
fn rename_apart(head: &Atom, body: &[Atom]) -> Unifier {
    let mut vars: BTreeSet<Var> = head.var_names();
    vars.insert(head.predicate_var().clone());
    vars.extend(head.relation_var().cloned());
    for atom in body {
        vars.extend(atom.var_names());
        vars.insert(atom.predicate_var().clone());
        vars.extend(atom.relation_var().cloned());
    }
    Unifier::from_pairs(vars.into_iter().map(|v| {
        let renamed = v.renamed_apart();
        (v, renamed)
    }))
}

/// Variables of a rule head that materialisation binds rather than reads.
fn produced_vars(conclusion: &Atom) -> BTreeSet<Var> {
    let mut produced = BTreeSet::new();
    match conclusion.kind() {
        AtomKind::Relationship { .. } => {
            produced.insert(conclusion.var().clone());
        }
        AtomKind::Resource {
            value_var,
            relation_var,
            predicates,
        } => {
            produced.insert(relation_var.clone());
            if !predicates.is_empty() {
                produced.insert(value_var.clone());
            }
        }
        AtomKind::Isa { .. } => {}
    }
    produced
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// Lazy answer stream of [`Reasoner::resolve`].
///
/// Each stack frame holds the partial answers that have resolved the atoms
/// before it; pulling the next answer extends the deepest frame. Dropping the
/// iterator stops resolution.
///
/// Laziness is per atom: entering a frame applies every rule that could
/// conclude its atom (rule bodies are resolved eagerly), then streams the store
/// match of that atom.
pub struct Answers<'r, 's> {
    reasoner: &'r Reasoner<'s>,
    atoms: Vec<Atom>,
    types: VarTypes,
    projection: BTreeSet<Var>,
    stack: Vec<AnswerIter<'s>>,
    seen: HashSet<Answer>,
}

impl Iterator for Answers<'_, '_> {
    type Item = ReasonerResult<Answer>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.len().checked_sub(1)?;
            let Some(partial) = self.stack[level].next() else {
                self.stack.pop();
                continue;
            };
            if level == self.atoms.len() {
                if !self.reasoner.satisfies_inner_predicates(&self.atoms, &partial) {
                    continue;
                }
                let answer = partial.project(&self.projection);
                if self.seen.insert(answer.clone()) {
                    return Some(Ok(answer));
                }
                continue;
            }
            let mut goals = Vec::new();
            match self
                .reasoner
                .atom_answers(&self.atoms[level], &self.types, &partial, &mut goals, 0)
            {
                Ok(answers) => self.stack.push(answers),
                Err(error) => {
                    self.stack.clear();
                    return Some(Err(error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::RolePlayer;
    use crate::concept::{ConceptId, Value, ValueType};
    use crate::predicate::{Comparator, ValuePredicate};
    use crate::store::MemGraph;

    struct World {
        graph: MemGraph,
        arena: QueryArena,
        rules: RuleSet,
    }

    impl World {
        fn new() -> Self {
            let graph = MemGraph::new();
            graph.define_entity_type("person", None).unwrap();
            graph.define_attribute_type("age", ValueType::Long, None).unwrap();
            graph.define_owns("person", "age").unwrap();
            graph
                .define_relation_type("parenthood", &["parent", "child"], None)
                .unwrap();
            graph
                .define_relation_type("ancestry", &["ancestor", "descendant"], None)
                .unwrap();
            for role in ["parent", "child", "ancestor", "descendant"] {
                graph.define_plays("person", role).unwrap();
            }
            Self {
                graph,
                arena: QueryArena::new(),
                rules: RuleSet::new(),
            }
        }

        fn ty(&self, label: &str) -> Option<ConceptId> {
            self.graph.schema_concept(label)
        }

        fn person(&self) -> ConceptId {
            self.graph.insert_entity(self.graph.require("person").unwrap()).unwrap()
        }

        fn rule(&mut self, label: &str, body: Vec<Atom>, head: Atom) {
            let body = self.arena.insert(body);
            let head = self.arena.insert(vec![head]);
            self.rules.add(InferenceRule::new(label, body, head));
        }

        fn pair(&self, relation: &str, roles: [&str; 2], vars: [&str; 2], rel_var: &str) -> Atom {
            Atom::relationship(
                Var::named(rel_var),
                self.ty(relation),
                vec![
                    RolePlayer::new(self.ty(roles[0]), Var::named(vars[0])),
                    RolePlayer::new(self.ty(roles[1]), Var::named(vars[1])),
                ],
            )
        }

        fn answers(&mut self, atoms: Vec<Atom>) -> Vec<Answer> {
            let query = self.arena.insert(atoms);
            let reasoner = Reasoner::new(&self.graph, &self.arena, &self.rules, ReasonerConfig::default());
            reasoner.resolve(query).unwrap().map(Result::unwrap).collect()
        }
    }

    fn age_30(w: &World, owner: &str) -> Atom {
        let a = Var::named("a");
        Atom::resource(Var::named(owner), w.ty("age"), a.clone(), vec![ValuePredicate::equals(a, 30)]).unwrap()
    }

    #[test]
    fn stored_facts_without_rules() {
        let mut w = World::new();
        let alice = w.person();
        w.person();
        let answers = w.answers(vec![Atom::isa(Var::named("x"), w.ty("person"))]);
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().any(|a| a.get(&Var::named("x")) == Some(alice)));
    }

    #[test]
    fn attribute_rule_is_materialised_once() {
        let mut w = World::new();
        w.person();
        w.person();
        let body = vec![Atom::isa(Var::named("x"), w.ty("person"))];
        let head = age_30(&w, "x");
        w.rule("everyone-is-thirty", body, head);

        let query = vec![age_30(&w, "p")];
        let first = w.answers(query.clone());
        assert_eq!(first.len(), 2);
        let age = w.ty("age").unwrap();
        assert_eq!(w.graph.instances_of(age).len(), 1);

        let concepts = w.graph.concept_count();
        let second = w.answers(query);
        assert_eq!(second.len(), 2);
        assert_eq!(w.graph.concept_count(), concepts);
        let attribute = second[0].get(&Var::named("a")).unwrap();
        assert_eq!(w.graph.value_of(attribute), Some(Value::Long(30)));
    }

    #[test]
    fn rule_with_other_value_does_not_answer() {
        let mut w = World::new();
        w.person();
        let body = vec![Atom::isa(Var::named("x"), w.ty("person"))];
        let head = age_30(&w, "x");
        w.rule("thirty", body, head);
        let a = Var::named("a");
        let forty = Atom::resource(Var::named("p"), w.ty("age"), a.clone(), vec![ValuePredicate::equals(a, 40)]).unwrap();
        assert!(w.answers(vec![forty]).is_empty());
    }

    #[test]
    fn recursive_rules_reach_a_fixpoint() {
        let mut w = World::new();
        let people: Vec<ConceptId> = (0..4).map(|_| w.person()).collect();
        let parenthood = w.ty("parenthood").unwrap();
        let (parent, child) = (w.ty("parent").unwrap(), w.ty("child").unwrap());
        for pair in people.windows(2) {
            w.graph
                .insert_relationship(parenthood, &[(parent, pair[0]), (child, pair[1])])
                .unwrap();
        }

        let base_body = vec![w.pair("parenthood", ["parent", "child"], ["x", "y"], "p")];
        let base_head = w.pair("ancestry", ["ancestor", "descendant"], ["x", "y"], "r");
        w.rule("parent-is-ancestor", base_body, base_head);
        let step_body = vec![
            w.pair("ancestry", ["ancestor", "descendant"], ["x", "z"], "r1"),
            w.pair("ancestry", ["ancestor", "descendant"], ["z", "y"], "r2"),
        ];
        let step_head = w.pair("ancestry", ["ancestor", "descendant"], ["x", "y"], "r");
        w.rule("ancestry-is-transitive", step_body, step_head);

        let query = w.pair("ancestry", ["ancestor", "descendant"], ["a", "d"], "rel");
        let answers = w.answers(vec![query]);
        let pairs: BTreeSet<(ConceptId, ConceptId)> = answers
            .iter()
            .map(|a| (a.get(&Var::named("a")).unwrap(), a.get(&Var::named("d")).unwrap()))
            .collect();
        // 4 people in a chain: 3 + 2 + 1 ancestor pairs.
        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&(people[0], people[3])));
        assert_eq!(w.graph.instances_of(w.ty("ancestry").unwrap()).len(), 6);
    }

    #[test]
    fn answers_are_lazy() {
        let mut w = World::new();
        for _ in 0..50 {
            w.person();
        }
        let query = w.arena.insert(vec![Atom::isa(Var::named("x"), w.ty("person"))]);
        let reasoner = Reasoner::new(&w.graph, &w.arena, &w.rules, ReasonerConfig::default());
        let first: Vec<Answer> = reasoner.resolve(query).unwrap().take(3).map(Result::unwrap).collect();
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn empty_query_is_an_error() {
        let w = World::new();
        let mut arena = QueryArena::new();
        let query = arena.insert(vec![]);
        let reasoner = Reasoner::new(&w.graph, &arena, &w.rules, ReasonerConfig::default());
        assert!(reasoner.resolve(query).is_err());
    }

    #[test]
    fn inner_variable_comparison_filters_joins() {
        let mut w = World::new();
        let age = w.ty("age").unwrap();
        let (alice, bob) = (w.person(), w.person());
        let thirty = w.graph.insert_attribute(age, Value::Long(30)).unwrap();
        let forty = w.graph.insert_attribute(age, Value::Long(40)).unwrap();
        w.graph.insert_has(alice, thirty).unwrap();
        w.graph.insert_has(bob, forty).unwrap();

        let (a, b) = (Var::named("a"), Var::named("b"));
        let older = Atom::resource(
            Var::named("x"),
            Some(age),
            a.clone(),
            vec![ValuePredicate::against(a, Comparator::Gt, b.clone())],
        )
        .unwrap();
        let other = Atom::resource(Var::named("y"), Some(age), b, vec![]).unwrap();
        let answers = w.answers(vec![older, other]);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(&Var::named("x")), Some(bob));
        assert_eq!(answers[0].get(&Var::named("y")), Some(alice));
    }

    #[test]
    fn reasoner_plans_query() {
        let mut w = World::new();
        w.person();
        let query = w
            .arena
            .insert(vec![Atom::isa(Var::named("x"), w.ty("person")), age_30(&w, "x")]);
        let reasoner = Reasoner::new(&w.graph, &w.arena, &w.rules, ReasonerConfig::default());
        assert_eq!(reasoner.plan(query).unwrap().order(), vec![1, 0]);
    }
}
