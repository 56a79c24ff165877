//! Unifiers between a rule-head atom (child) and the atom being resolved (parent).

use crate::error::UnifierResult;
use crate::unifier::{MergePolicy, Unifier};
use crate::var::Var;

use super::{Atom, AtomKind, RolePlayer};

/// Single mapping, or the identity when the variables already coincide.
fn map(from: &Var, to: &Var) -> Unifier {
    if from == to {
        Unifier::new()
    } else {
        Unifier::single(from.clone(), to.clone())
    }
}

/// Align every parent role player with a distinct child role player playing the
/// same role (or any role, when the parent leaves it open).
fn align_role_players(
    parent: &[RolePlayer],
    child: &[RolePlayer],
    used: &mut [bool],
    pairs: &mut Vec<(Var, Var)>,
) -> bool {
    let Some((first, rest)) = parent.split_first() else {
        return true;
    };
    for (i, candidate) in child.iter().enumerate() {
        if used[i] || (first.role.is_some() && first.role != candidate.role) {
            continue;
        }
        used[i] = true;
        pairs.push((candidate.player.clone(), first.player.clone()));
        if align_role_players(rest, child, used, pairs) {
            return true;
        }
        pairs.pop();
        used[i] = false;
    }
    false
}

impl Atom {
    /// The unifier mapping this atom's variables onto `parent`'s.
    ///
    /// Against a parent of a different kind only the value/type holder variable is
    /// unified with the parent's primary variable. Mappings for different parts of
    /// the atom are merged under `policy`.
    pub fn unifier(&self, parent: &Atom, policy: MergePolicy) -> UnifierResult<Unifier> {
        match (&self.kind, &parent.kind) {
            (
                AtomKind::Resource {
                    value_var,
                    relation_var,
                    ..
                },
                AtomKind::Resource {
                    value_var: parent_value,
                    relation_var: parent_relation,
                    ..
                },
            ) => {
                let mut unifier = map(&self.var, &parent.var).merge(&map(value_var, parent_value), policy)?;
                if parent_relation.is_user_defined() && relation_var != parent_relation {
                    unifier = unifier.merge(&Unifier::single(relation_var.clone(), parent_relation.clone()), policy)?;
                }
                Ok(unifier)
            }
            (AtomKind::Resource { value_var, .. }, _) => Ok(map(value_var, &parent.var)),
            (
                AtomKind::Relationship {
                    type_var,
                    role_players,
                },
                AtomKind::Relationship {
                    type_var: parent_type,
                    role_players: parent_players,
                },
            ) => {
                let mut unifier = map(&self.var, &parent.var);
                if parent_type.is_user_defined() {
                    unifier = unifier.merge(&map(type_var, parent_type), policy)?;
                }
                let mut used = vec![false; role_players.len()];
                let mut pairs = Vec::new();
                if align_role_players(parent_players, role_players, &mut used, &mut pairs) {
                    for (from, to) in pairs {
                        unifier = unifier.merge(&map(&from, &to), policy)?;
                    }
                }
                Ok(unifier)
            }
            (AtomKind::Isa { type_var }, AtomKind::Isa { type_var: parent_type }) => {
                let mut unifier = map(&self.var, &parent.var);
                if parent_type.is_user_defined() {
                    unifier = unifier.merge(&map(type_var, parent_type), policy)?;
                }
                Ok(unifier)
            }
            _ => Ok(map(&self.var, &parent.var)),
        }
    }
}
