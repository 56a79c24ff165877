//! Pre-unification pruning: could a rule concluding `candidate` answer this atom?

use crate::concept::ConceptId;
use crate::query::VarTypes;
use crate::store::GraphStore;

use super::{Atom, AtomTag};

/// A rule concluding `child` can answer a query for `parent` when the conclusion
/// is at least as specific. An unknown type on either side is compatible.
fn types_compatible(store: &dyn GraphStore, parent: Option<ConceptId>, child: Option<ConceptId>) -> bool {
    match (parent, child) {
        (Some(p), Some(c)) => store.is_subtype(c, p),
        _ => true,
    }
}

fn are_disjoint(store: &dyn GraphStore, a: ConceptId, b: ConceptId) -> bool {
    !store.is_subtype(a, b) && !store.is_subtype(b, a)
}

impl Atom {
    /// Whether a rule whose head is `candidate` could produce answers for this
    /// atom. A cheap filter run before any unification.
    ///
    /// `types` are the variable types of the conjunction this atom is resolved
    /// in, `rule_types` those of the rule concluding `candidate` (body and head
    /// together).
    pub fn is_rule_applicable_via_atom(
        &self,
        types: &VarTypes,
        store: &dyn GraphStore,
        candidate: &Atom,
        rule_types: &VarTypes,
    ) -> bool {
        match (self.tag(), candidate.tag()) {
            (AtomTag::Resource, AtomTag::Resource) => self.resource_applicable(types, store, candidate, rule_types),
            (AtomTag::Relationship, AtomTag::Resource) => {
                let implicit = self
                    .type_id
                    .is_some_and(|t| store.attribute_type_of_implicit(t).is_some());
                if !implicit {
                    return false;
                }
                match candidate.to_relationship_atom(store) {
                    Ok(converted) => self.relationship_applicable(types, store, candidate, &converted, rule_types),
                    Err(_) => false,
                }
            }
            (AtomTag::Relationship, AtomTag::Relationship) => {
                self.relationship_applicable(types, store, candidate, candidate, rule_types)
            }
            (AtomTag::Isa, AtomTag::Relationship | AtomTag::Resource) => {
                types_compatible(store, self.type_id, candidate.type_id)
            }
            _ => false,
        }
    }

    /// Owner-type compatibility between this atom's conjunction and the rule.
    fn owner_types_compatible(
        &self,
        types: &VarTypes,
        store: &dyn GraphStore,
        candidate: &Atom,
        rule_types: &VarTypes,
    ) -> bool {
        let parent_type = types.get(self.var());
        let child_type = rule_types.get(candidate.var());
        if let (Some(p), Some(c)) = (parent_type, child_type)
            && are_disjoint(store, p, c)
        {
            return false;
        }
        rule_types.is_type_role_compatible(store, candidate.var(), parent_type)
    }

    fn resource_applicable(
        &self,
        types: &VarTypes,
        store: &dyn GraphStore,
        candidate: &Atom,
        rule_types: &VarTypes,
    ) -> bool {
        if !types_compatible(store, self.type_id, candidate.type_id) {
            return false;
        }
        if !self.owner_types_compatible(types, store, candidate, rule_types) {
            return false;
        }
        let ours = self.value_predicates();
        let theirs = candidate.value_predicates();
        if ours.is_empty() || theirs.is_empty() {
            return true;
        }
        theirs
            .iter()
            .all(|child| ours.iter().any(|parent| parent.is_compatible_with(child)))
    }

    /// `owner` is the rule-head atom as written; `converted` is the form being
    /// compared, which differs when a resource head was turned into its implicit
    /// relationship.
    fn relationship_applicable(
        &self,
        types: &VarTypes,
        store: &dyn GraphStore,
        owner: &Atom,
        converted: &Atom,
        rule_types: &VarTypes,
    ) -> bool {
        if !types_compatible(store, self.type_id, converted.type_id) {
            return false;
        }
        let ours = self.role_players();
        let theirs = converted.role_players();
        if ours.len() > theirs.len() {
            return false;
        }
        let roles_covered = ours.iter().filter_map(|rp| rp.role).all(|wanted| {
            theirs
                .iter()
                .filter_map(|rp| rp.role)
                .any(|offered| store.is_subtype(offered, wanted))
        });
        if !roles_covered {
            return false;
        }
        if owner.is_resource() {
            // The parent's owner is a role player, not its primary variable.
            let owner_role = theirs
                .iter()
                .find(|rp| &rp.player == owner.var())
                .and_then(|rp| rp.role);
            let parent_owner = ours
                .iter()
                .find(|rp| rp.role.is_some() && rp.role == owner_role)
                .and_then(|rp| types.get(&rp.player));
            let child_owner = rule_types.get(owner.var());
            return match (parent_owner, child_owner) {
                (Some(p), Some(c)) => !are_disjoint(store, p, c),
                _ => true,
            };
        }
        self.owner_types_compatible(types, store, owner, rule_types)
    }
}
