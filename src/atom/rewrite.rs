//! Rewrites that normalise an atom before it is matched against a rule head.

use crate::error::{AtomError, AtomResult};
use crate::store::GraphStore;

use super::{Atom, AtomKind, RolePlayer};

impl Atom {
    /// The implicit relationship form of an attribute-ownership atom:
    /// `$x has age $a($r)` becomes `$r (@has-age-owner: $x, @has-age-value: $a) isa @has-age`.
    ///
    /// Value predicates do not survive the conversion. Fails when the atom is not
    /// a resource atom or its attribute type has no implicit ownership types.
    pub fn to_relationship_atom(&self, store: &dyn GraphStore) -> AtomResult<Atom> {
        let illegal = || AtomError::IllegalConversion {
            atom: self.display(store).to_string(),
        };
        let AtomKind::Resource {
            value_var,
            relation_var,
            ..
        } = &self.kind
        else {
            return Err(illegal());
        };
        let attribute_type = self.type_id.ok_or_else(illegal)?;
        let (relation, owner_role, value_role) =
            store.implicit_ownership(attribute_type).ok_or_else(illegal)?;
        let mut atom = Atom::relationship(
            relation_var.clone(),
            Some(relation),
            vec![
                RolePlayer::new(Some(owner_role), self.var.clone()),
                RolePlayer::new(Some(value_role), value_var.clone()),
            ],
        );
        atom.owner = self.owner;
        atom.id_predicates = self.id_predicates.clone();
        Ok(atom)
    }

    /// The same atom with its ownership relation variable marked user-defined.
    pub fn rewrite_with_relation_variable(&self) -> Atom {
        let mut atom = self.clone();
        if let AtomKind::Resource { relation_var, .. } = &mut atom.kind {
            *relation_var = relation_var.as_user_defined();
        }
        atom
    }

    /// Name the relation variable only when `parent` reifies its own ownership
    /// edge with a user-defined relation variable.
    pub fn rewrite_with_relation_variable_for(&self, parent: &Atom) -> Atom {
        if parent.is_resource() && parent.is_user_defined() {
            self.rewrite_with_relation_variable()
        } else {
            self.clone()
        }
    }

    /// The same atom with its value/type holder variable marked user-defined.
    pub fn rewrite_with_type_variable(&self) -> Atom {
        let mut atom = self.clone();
        match &mut atom.kind {
            AtomKind::Isa { type_var } | AtomKind::Relationship { type_var, .. } => {
                *type_var = type_var.as_user_defined();
            }
            AtomKind::Resource { value_var, .. } => {
                *value_var = value_var.as_user_defined();
            }
        }
        atom
    }

    /// Bring a rule-head atom into the user-defined form `parent` is written in.
    pub fn rewrite_to_user_defined(&self, parent: &Atom) -> Atom {
        let atom = self.rewrite_with_relation_variable_for(parent);
        if parent.predicate_var().is_user_defined() {
            atom.rewrite_with_type_variable()
        } else {
            atom
        }
    }
}
