//! Writing a rule's conclusion back into the store.

use crate::answer::Answer;
use crate::concept::ConceptId;
use crate::error::{AtomError, QueryError, ReasonerResult};
use crate::store::GraphStore;
use crate::var::Var;

use super::{Atom, AtomKind};

impl Atom {
    fn bound(&self, store: &dyn GraphStore, substitution: &Answer, var: &Var) -> ReasonerResult<ConceptId> {
        substitution.get(var).ok_or_else(|| {
            QueryError::UnboundVariable {
                var: var.to_string(),
                atom: self.display(store).to_string(),
            }
            .into()
        })
    }

    fn illegal(&self, store: &dyn GraphStore, reason: &str) -> AtomError {
        AtomError::IllegalMaterialisation {
            atom: self.display(store).to_string(),
            reason: reason.to_string(),
        }
    }

    /// Assert this (rule-head) atom as true under `substitution`, the answer of
    /// the satisfied rule body. Returns the substitution extended with the
    /// concepts the conclusion is made of.
    ///
    /// Materialising the same substitution again finds the facts written the
    /// first time instead of duplicating them.
    pub fn materialise(&self, store: &dyn GraphStore, substitution: &Answer) -> ReasonerResult<Vec<Answer>> {
        match &self.kind {
            AtomKind::Resource {
                value_var,
                relation_var,
                predicates,
            } => {
                let attribute_type = self
                    .type_id
                    .ok_or_else(|| self.illegal(store, "attribute type is unresolved"))?;
                let owner = self.bound(store, substitution, &self.var)?;
                let attribute = match substitution.get(value_var) {
                    Some(existing) => existing,
                    None => {
                        let value = match predicates.as_slice() {
                            [single] => single
                                .equals_value()
                                .ok_or_else(|| self.illegal(store, "value predicate is not a concrete literal"))?,
                            [] => {
                                return Err(QueryError::UnboundVariable {
                                    var: value_var.to_string(),
                                    atom: self.display(store).to_string(),
                                }
                                .into());
                            }
                            _ => {
                                return Err(AtomError::AmbiguousConclusion {
                                    atom: self.display(store).to_string(),
                                    count: predicates.len(),
                                }
                                .into());
                            }
                        };
                        store.put_attribute_inferred(attribute_type, value)?
                    }
                };
                let relation = store.attach_attribute_inferred(owner, attribute)?;
                tracing::info!(%owner, %attribute, %relation, atom = %self.display(store), "materialised attribute ownership");
                let mut answer = substitution
                    .extend(value_var.clone(), attribute)
                    .ok_or_else(|| self.illegal(store, "attribute conflicts with the substitution"))?;
                if relation_var.is_user_defined() {
                    answer = answer
                        .extend(relation_var.clone(), relation)
                        .ok_or_else(|| self.illegal(store, "relation conflicts with the substitution"))?;
                }
                Ok(vec![answer])
            }
            AtomKind::Relationship { role_players, .. } => {
                let relation_type = self
                    .type_id
                    .ok_or_else(|| self.illegal(store, "relationship type is unresolved"))?;
                let mut pairs = Vec::with_capacity(role_players.len());
                for rp in role_players {
                    let role = rp
                        .role
                        .ok_or_else(|| self.illegal(store, "role player without a role"))?;
                    pairs.push((role, self.bound(store, substitution, &rp.player)?));
                }
                let relation = store.put_relationship_inferred(relation_type, &pairs)?;
                tracing::info!(%relation, atom = %self.display(store), "materialised relationship");
                let answer = substitution
                    .extend(self.var.clone(), relation)
                    .ok_or_else(|| self.illegal(store, "relationship conflicts with the substitution"))?;
                Ok(vec![answer])
            }
            AtomKind::Isa { .. } => Err(self.illegal(store, "type membership cannot be inferred").into()),
        }
    }
}
