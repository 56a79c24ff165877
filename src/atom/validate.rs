//! Rule-head legality and ontological validation.
//!
//! Both checks collect messages instead of failing, so every problem with a rule
//! is reported in one pass.

use std::collections::BTreeSet;

use crate::concept::{ConceptId, ConceptKind};
use crate::query::{QueryArena, VarTypes};
use crate::rule::InferenceRule;
use crate::store::GraphStore;

use super::{Atom, AtomKind};

fn label_of(store: &dyn GraphStore, id: ConceptId) -> String {
    store.label(id).unwrap_or_else(|| id.to_string())
}

impl Atom {
    /// Problems that make this atom unusable as the head of `rule`.
    pub fn validate_as_rule_head(
        &self,
        rule: &InferenceRule,
        arena: &QueryArena,
        store: &dyn GraphStore,
    ) -> BTreeSet<String> {
        let mut errors = BTreeSet::new();
        let label = rule.label();
        let shown = self.display(store);
        let body_vars = match arena.query(rule.body()) {
            Ok(body) => body.var_names(),
            Err(e) => {
                errors.insert(format!("rule {label}: {e}"));
                return errors;
            }
        };

        match &self.kind {
            AtomKind::Isa { .. } => {
                errors.insert(format!(
                    "the head atom {shown} of rule {label} is a type membership, which cannot be inferred"
                ));
            }
            AtomKind::Relationship { role_players, .. } => {
                if self.type_id.is_none() {
                    errors.insert(format!(
                        "the head atom {shown} of rule {label} has an unresolved relationship type"
                    ));
                }
                if role_players.iter().any(|rp| rp.role.is_none()) {
                    errors.insert(format!(
                        "the head atom {shown} of rule {label} has a role player without an explicit role"
                    ));
                }
            }
            AtomKind::Resource {
                value_var,
                predicates,
                ..
            } => {
                if self.type_id.is_none() || predicates.len() > 1 {
                    errors.insert(format!(
                        "the head atom {shown} of rule {label} has an unresolved type or ambiguous value predicates"
                    ));
                }
                if predicates.is_empty() && !body_vars.contains(value_var) {
                    errors.insert(unbound(&shown, label, value_var));
                }
                if predicates.iter().any(|p| !p.is_specific()) {
                    errors.insert(format!(
                        "the head atom {shown} of rule {label} has a non-specific value predicate; \
                         rule heads can only assert concrete values"
                    ));
                }
            }
        }

        for var in self.var_names() {
            let produced = match &self.kind {
                AtomKind::Relationship { .. } => var == self.var,
                AtomKind::Resource {
                    value_var,
                    relation_var,
                    predicates,
                } => (&var == value_var && !predicates.is_empty()) || &var == relation_var,
                AtomKind::Isa { .. } => false,
            };
            if !produced && !body_vars.contains(&var) {
                errors.insert(unbound(&shown, label, &var));
            }
        }
        errors
    }

    /// Problems with this atom against the schema: wrong kinds of types, roles a
    /// relationship type does not relate, owners that cannot own an attribute.
    ///
    /// `types` are the variable types of the conjunction the atom belongs to;
    /// for a rule atom that is the whole rule, see [`InferenceRule::var_types`].
    pub fn validate_ontologically(&self, types: &VarTypes, store: &dyn GraphStore) -> BTreeSet<String> {
        let mut errors = BTreeSet::new();
        let Some(ty) = self.type_id else {
            return errors;
        };
        let Some(concept) = store.concept(ty) else {
            errors.insert(format!("{} refers to unknown type {ty}", self.display(store)));
            return errors;
        };
        let type_label = label_of(store, ty);

        match &self.kind {
            AtomKind::Isa { .. } => {
                if !concept.kind.is_type() {
                    errors.insert(format!("{type_label} is not a type"));
                }
            }
            AtomKind::Relationship { role_players, .. } => {
                if concept.kind != ConceptKind::RelationType {
                    errors.insert(format!("{type_label} is not a relationship type"));
                    return errors;
                }
                let related = store.relates(ty);
                for rp in role_players {
                    let Some(role) = rp.role else {
                        continue;
                    };
                    if !related.contains(&role) {
                        errors.insert(format!(
                            "role {} is not related by relationship type {type_label}",
                            label_of(store, role)
                        ));
                    }
                    if let Some(player_type) = types.get(&rp.player) {
                        let can_play = store
                            .subtypes(player_type)
                            .into_iter()
                            .any(|t| store.plays(t).contains(&role));
                        if !can_play {
                            errors.insert(format!(
                                "type {} cannot play role {}",
                                label_of(store, player_type),
                                label_of(store, role)
                            ));
                        }
                    }
                }
            }
            AtomKind::Resource { .. } => {
                if !matches!(concept.kind, ConceptKind::AttributeType(_)) {
                    errors.insert(format!("{type_label} is not an attribute type"));
                    return errors;
                }
                if let Some(owner_type) = types.get(&self.var)
                    && !store.owns(owner_type, ty)
                {
                    errors.insert(format!(
                        "type {} cannot own attribute {type_label}",
                        label_of(store, owner_type)
                    ));
                }
            }
        }
        errors
    }
}

fn unbound(atom: &impl std::fmt::Display, label: &str, var: &crate::var::Var) -> String {
    format!("the head atom {atom} of rule {label} contains variable {var} that the rule body does not bind")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::RolePlayer;
    use crate::concept::ValueType;
    use crate::predicate::{Comparator, ValuePredicate};
    use crate::query::QueryId;
    use crate::store::MemGraph;
    use crate::var::Var;

    struct Setup {
        graph: MemGraph,
        arena: QueryArena,
    }

    impl Setup {
        fn new() -> Self {
            let graph = MemGraph::new();
            graph.define_entity_type("person", None).unwrap();
            graph.define_entity_type("company", None).unwrap();
            graph.define_attribute_type("age", ValueType::Long, None).unwrap();
            graph.define_owns("person", "age").unwrap();
            graph.define_relation_type("friendship", &["friend"], None).unwrap();
            graph.define_plays("person", "friend").unwrap();
            Self {
                graph,
                arena: QueryArena::new(),
            }
        }

        fn ty(&self, label: &str) -> Option<ConceptId> {
            self.graph.schema_concept(label)
        }

        fn age(&self, preds: Vec<ValuePredicate>) -> Atom {
            Atom::resource(Var::named("x"), self.ty("age"), Var::named("a"), preds).unwrap()
        }

        fn rule(&mut self, body: Vec<Atom>, head: Atom) -> (InferenceRule, QueryId) {
            let body = self.arena.insert(body);
            let head = self.arena.insert(vec![head]);
            (InferenceRule::new("r", body, head), head)
        }

        fn head_errors(&mut self, body: Vec<Atom>, head: Atom) -> BTreeSet<String> {
            let (rule, head) = self.rule(body, head);
            let atom = self.arena.query(head).unwrap().atoms()[0].clone();
            atom.validate_as_rule_head(&rule, &self.arena, &self.graph)
        }
    }

    fn a() -> Var {
        Var::named("a")
    }

    #[test]
    fn specific_head_with_bound_owner_is_legal() {
        let mut s = Setup::new();
        let person = Atom::isa(Var::named("x"), s.ty("person"));
        let head = s.age(vec![ValuePredicate::equals(a(), 30)]);
        assert!(s.head_errors(vec![person], head).is_empty());
    }

    #[test]
    fn owner_unbound_without_body_atom() {
        let mut s = Setup::new();
        let unrelated = Atom::isa(Var::named("y"), s.ty("person"));
        let head = s.age(vec![ValuePredicate::equals(a(), 30)]);
        let errors = s.head_errors(vec![unrelated], head);
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().next().unwrap().contains("does not bind"));
    }

    #[test]
    fn two_value_predicates_rejected() {
        let mut s = Setup::new();
        let person = Atom::isa(Var::named("x"), s.ty("person"));
        let head = s.age(vec![
            ValuePredicate::equals(a(), 30),
            ValuePredicate::compare(a(), Comparator::Gt, 10),
        ]);
        let errors = s.head_errors(vec![person], head);
        assert!(errors.iter().any(|e| e.contains("ambiguous")));
        assert!(errors.iter().any(|e| e.contains("non-specific")));
    }

    #[test]
    fn unbound_value_variable_rejected() {
        let mut s = Setup::new();
        let person = Atom::isa(Var::named("x"), s.ty("person"));
        let errors = s.head_errors(vec![person.clone()], s.age(vec![]));
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().next().unwrap().contains("$a"));

        // Bound by another body atom.
        let other = Atom::resource(Var::named("y"), s.ty("age"), a(), vec![]).unwrap();
        let y = Atom::isa(Var::named("y"), s.ty("person"));
        assert!(s.head_errors(vec![person, other, y], s.age(vec![])).is_empty());
    }

    #[test]
    fn nonspecific_only_predicate_rejected() {
        let mut s = Setup::new();
        let person = Atom::isa(Var::named("x"), s.ty("person"));
        let head = s.age(vec![ValuePredicate::compare(a(), Comparator::Gt, 10)]);
        let errors = s.head_errors(vec![person], head);
        assert_eq!(errors.len(), 1);
        assert!(errors.iter().next().unwrap().contains("non-specific"));
    }

    #[test]
    fn isa_head_rejected() {
        let mut s = Setup::new();
        let person = Atom::isa(Var::named("x"), s.ty("person"));
        let errors = s.head_errors(vec![person.clone()], person);
        assert!(errors.iter().any(|e| e.contains("type membership")));
    }

    #[test]
    fn relationship_head_needs_bound_players() {
        let mut s = Setup::new();
        let friend = s.ty("friend");
        let head = Atom::relationship(
            Var::named("f"),
            s.ty("friendship"),
            vec![
                RolePlayer::new(friend, Var::named("x")),
                RolePlayer::new(friend, Var::named("y")),
            ],
        );
        let x = Atom::isa(Var::named("x"), s.ty("person"));
        let errors = s.head_errors(vec![x.clone()], head.clone());
        assert!(errors.iter().any(|e| e.contains("$y")));
        let y = Atom::isa(Var::named("y"), s.ty("person"));
        assert!(s.head_errors(vec![x, y], head).is_empty());
    }

    #[test]
    fn head_owner_typed_by_body_must_own_the_attribute() {
        let mut s = Setup::new();
        let company = Atom::isa(Var::named("x"), s.ty("company"));
        let head = s.age(vec![ValuePredicate::equals(a(), 30)]);
        let (rule, head) = s.rule(vec![company], head);
        let atom = s.arena.query(head).unwrap().atoms()[0].clone();
        let types = rule.var_types(&s.arena).unwrap();

        let errors = atom.validate_ontologically(&types, &s.graph);
        assert!(errors.contains("type company cannot own attribute age"), "{errors:?}");

        // Without the body, nothing types the owner.
        let alone = atom.validate_ontologically(&VarTypes::of([&atom]), &s.graph);
        assert!(alone.is_empty());

        let person = Atom::isa(Var::named("x"), s.ty("person"));
        let (rule, _) = s.rule(vec![person], s.age(vec![ValuePredicate::equals(a(), 30)]));
        let types = rule.var_types(&s.arena).unwrap();
        assert!(atom.validate_ontologically(&types, &s.graph).is_empty());
    }

    #[test]
    fn head_players_typed_by_body_must_play_their_roles() {
        let mut s = Setup::new();
        let company = Atom::isa(Var::named("x"), s.ty("company"));
        let head = Atom::relationship(
            Var::named("f"),
            s.ty("friendship"),
            vec![RolePlayer::new(s.ty("friend"), Var::named("x"))],
        );
        let (rule, _) = s.rule(vec![company], head);
        let errors = rule.validate(&s.arena, &s.graph).unwrap();
        assert!(errors.contains("type company cannot play role friend"), "{errors:?}");
    }

    #[test]
    fn schema_kinds_and_roles_checked() {
        let s = Setup::new();
        let none = VarTypes::default();

        let not_attribute = Atom::resource(Var::named("x"), s.ty("person"), a(), vec![]).unwrap();
        let errors = not_attribute.validate_ontologically(&none, &s.graph);
        assert!(errors.contains("person is not an attribute type"));

        let bad_role = Atom::relationship(
            Var::named("f"),
            s.ty("friendship"),
            vec![RolePlayer::new(s.ty("@has-age-owner"), Var::named("x"))],
        );
        let errors = bad_role.validate_ontologically(&none, &s.graph);
        assert!(errors.iter().any(|e| e.contains("is not related by")));
    }

    #[test]
    fn messages_use_schema_labels() {
        let mut s = Setup::new();
        let unrelated = Atom::isa(Var::named("y"), s.ty("person"));
        let errors = s.head_errors(vec![unrelated], s.age(vec![ValuePredicate::equals(a(), 30)]));
        let message = errors.iter().next().unwrap();
        assert!(message.contains("$x has age 30"), "{message}");
    }
}
