//! Inference rules for backward chaining.
//!
//! A rule is a pair of queries in a [`QueryArena`]: a body (`when`) and a
//! single-atom head (`then`). Rules are data, not code: they are built
//! programmatically or loaded from a fixture.

use std::collections::{BTreeMap, BTreeSet};

use crate::atom::Atom;
use crate::error::{QueryError, QueryResult, ReasonerResult};
use crate::query::{QueryArena, QueryId, VarTypes};
use crate::store::GraphStore;

// ---------------------------------------------------------------------------
// Inference rule
// ---------------------------------------------------------------------------

/// `when { body } then { head }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRule {
    label: String,
    body: QueryId,
    head: QueryId,
}

impl InferenceRule {
    pub fn new(label: impl Into<String>, body: QueryId, head: QueryId) -> Self {
        Self {
            label: label.into(),
            body,
            head,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn body(&self) -> QueryId {
        self.body
    }

    pub fn head(&self) -> QueryId {
        self.head
    }

    /// The atom this rule concludes.
    pub fn head_atom<'a>(&self, arena: &'a QueryArena) -> QueryResult<&'a Atom> {
        arena.query(self.head)?.atoms().first().ok_or(QueryError::Empty)
    }

    pub fn body_atoms<'a>(&self, arena: &'a QueryArena) -> QueryResult<&'a [Atom]> {
        Ok(arena.query(self.body)?.atoms())
    }

    /// Variable types over body and head together. The head shares the body's
    /// variable namespace, so its owner is typed by the body's isa atoms.
    pub fn var_types(&self, arena: &QueryArena) -> QueryResult<VarTypes> {
        let body = arena.query(self.body)?;
        let head = arena.query(self.head)?;
        Ok(VarTypes::of(body.atoms().iter().chain(head.atoms())))
    }

    /// Every problem with this rule, as human-readable messages. An empty set
    /// means the rule is legal.
    pub fn validate(&self, arena: &QueryArena, store: &dyn GraphStore) -> ReasonerResult<BTreeSet<String>> {
        let mut errors = BTreeSet::new();
        let head = arena.query(self.head)?;
        let body = arena.query(self.body)?;
        if head.len() != 1 {
            errors.insert(format!(
                "rule {} must conclude exactly one atom, found {}",
                self.label,
                head.len()
            ));
        }
        if body.is_empty() {
            errors.insert(format!("rule {} has an empty body", self.label));
        }
        let types = self.var_types(arena)?;
        for atom in head.atoms() {
            errors.extend(atom.validate_as_rule_head(self, arena, store));
        }
        for atom in head.atoms().iter().chain(body.atoms()) {
            errors.extend(atom.validate_ontologically(&types, store));
        }
        Ok(errors)
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// An ordered collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<InferenceRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: InferenceRule) {
        self.rules.push(rule);
    }

    pub fn with_rule(mut self, rule: InferenceRule) -> Self {
        self.add(rule);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &InferenceRule> {
        self.rules.iter()
    }

    pub fn get(&self, label: &str) -> Option<&InferenceRule> {
        self.rules.iter().find(|r| r.label == label)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validation messages per rule label, for rules with at least one problem.
    pub fn validate(
        &self,
        arena: &QueryArena,
        store: &dyn GraphStore,
    ) -> ReasonerResult<BTreeMap<String, BTreeSet<String>>> {
        let mut report = BTreeMap::new();
        for rule in &self.rules {
            let errors = rule.validate(arena, store)?;
            if !errors.is_empty() {
                report.insert(rule.label.clone(), errors);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::ValueType;
    use crate::predicate::ValuePredicate;
    use crate::store::MemGraph;
    use crate::var::Var;

    fn graph() -> MemGraph {
        let g = MemGraph::new();
        g.define_entity_type("person", None).unwrap();
        g.define_entity_type("company", None).unwrap();
        g.define_attribute_type("age", ValueType::Long, None).unwrap();
        g.define_owns("person", "age").unwrap();
        g
    }

    fn age_30(g: &MemGraph) -> Atom {
        let a = Var::named("a");
        Atom::resource(
            Var::named("x"),
            g.schema_concept("age"),
            a.clone(),
            vec![ValuePredicate::equals(a, 30)],
        )
        .unwrap()
    }

    #[test]
    fn legal_rule_validates_cleanly() {
        let g = graph();
        let mut arena = QueryArena::new();
        let body = arena.insert(vec![Atom::isa(Var::named("x"), g.schema_concept("person"))]);
        let head = arena.insert(vec![age_30(&g)]);
        let rules = RuleSet::new().with_rule(InferenceRule::new("thirty", body, head));
        assert!(rules.validate(&arena, &g).unwrap().is_empty());
        assert!(rules.get("thirty").unwrap().head_atom(&arena).unwrap().is_resource());
    }

    #[test]
    fn head_owner_is_typed_by_the_body() {
        let g = graph();
        let mut arena = QueryArena::new();
        let body = arena.insert(vec![Atom::isa(Var::named("x"), g.schema_concept("company"))]);
        let head = arena.insert(vec![age_30(&g)]);
        let rule = InferenceRule::new("company-age", body, head);

        let types = rule.var_types(&arena).unwrap();
        assert_eq!(types.get(&Var::named("x")), g.schema_concept("company"));
        assert_eq!(types.get(&Var::named("a")), g.schema_concept("age"));

        let errors = rule.validate(&arena, &g).unwrap();
        assert!(errors.contains("type company cannot own attribute age"), "{errors:?}");
    }

    #[test]
    fn multi_atom_head_and_empty_body_reported() {
        let g = graph();
        let mut arena = QueryArena::new();
        let body = arena.insert(vec![]);
        let head = arena.insert(vec![age_30(&g), age_30(&g)]);
        let rule = InferenceRule::new("broken", body, head);
        let errors = rule.validate(&arena, &g).unwrap();
        assert!(errors.iter().any(|e| e.contains("exactly one atom")));
        assert!(errors.iter().any(|e| e.contains("empty body")));
    }

    #[test]
    fn empty_head_has_no_head_atom() {
        let mut arena = QueryArena::new();
        let body = arena.insert(vec![]);
        let head = arena.insert(vec![]);
        let rule = InferenceRule::new("nothing", body, head);
        assert!(rule.head_atom(&arena).is_err());
    }
}
