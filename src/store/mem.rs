//! In-memory typed graph backed by petgraph and DashMap.
//!
//! Concepts live in a `DashMap`; role-player edges (relationship → player,
//! weighted by role) live in a petgraph `DiGraph`. Attributes are unique per
//! `(type, value)` and relationships are unique per `(type, role players)`: both
//! go through a look-up-or-create index using the DashMap entry API, so a fact
//! inferred any number of times, from any number of threads, is stored once.

use std::collections::{BTreeSet, VecDeque};
use std::sync::RwLock;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::answer::Answer;
use crate::atom::{Atom, AtomTag, RolePlayer};
use crate::concept::{AtomicConceptAllocator, Concept, ConceptId, ConceptKind, Value, ValueType};
use crate::error::{StoreError, StoreResult};
use crate::predicate::Operand;

use super::{AnswerIter, GraphStore, has_owner_label, has_type_label, has_value_label};

/// Edge weight: the role a player plays in a relationship.
#[derive(Debug, Clone, Copy)]
struct RoleEdge {
    role: ConceptId,
    inferred: bool,
}

type RelationshipKey = (ConceptId, Vec<(ConceptId, ConceptId)>);

/// In-memory graph store.
pub struct MemGraph {
    allocator: AtomicConceptAllocator,
    concepts: DashMap<ConceptId, Concept>,
    labels: DashMap<String, ConceptId>,
    /// Direct supertype of a schema type.
    supertype: DashMap<ConceptId, ConceptId>,
    plays: DashMap<ConceptId, BTreeSet<ConceptId>>,
    relates: DashMap<ConceptId, BTreeSet<ConceptId>>,
    owns: DashMap<ConceptId, BTreeSet<ConceptId>>,
    /// Instances by direct type.
    instances: DashMap<ConceptId, Vec<ConceptId>>,
    graph: RwLock<DiGraph<ConceptId, RoleEdge>>,
    node_index: DashMap<ConceptId, NodeIndex>,
    attributes: DashMap<(ConceptId, Value), ConceptId>,
    relationships: DashMap<RelationshipKey, ConceptId>,
}

impl MemGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            allocator: AtomicConceptAllocator::new(),
            concepts: DashMap::new(),
            labels: DashMap::new(),
            supertype: DashMap::new(),
            plays: DashMap::new(),
            relates: DashMap::new(),
            owns: DashMap::new(),
            instances: DashMap::new(),
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            attributes: DashMap::new(),
            relationships: DashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Resolve a schema label.
    pub fn require(&self, label: &str) -> StoreResult<ConceptId> {
        self.schema_concept(label)
            .ok_or_else(|| StoreError::UnknownLabel {
                label: label.to_string(),
            })
    }

    fn define(&self, label: &str, kind: ConceptKind, sup: Option<&str>) -> StoreResult<ConceptId> {
        let sup = sup.map(|s| self.require(s)).transpose()?;
        match self.labels.entry(label.to_string()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateLabel {
                label: label.to_string(),
            }),
            Entry::Vacant(e) => {
                let id = self.allocator.next_id()?;
                self.concepts.insert(id, Concept::schema(id, kind, label));
                if let Some(sup) = sup {
                    self.supertype.insert(id, sup);
                }
                e.insert(id);
                tracing::debug!(%id, label, %kind, "schema concept defined");
                Ok(id)
            }
        }
    }

    fn ensure_role(&self, label: &str) -> StoreResult<ConceptId> {
        match self.labels.entry(label.to_string()) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let id = self.allocator.next_id()?;
                self.concepts
                    .insert(id, Concept::schema(id, ConceptKind::Role, label));
                e.insert(id);
                Ok(id)
            }
        }
    }

    /// Define an entity type, optionally under a supertype.
    pub fn define_entity_type(&self, label: &str, sup: Option<&str>) -> StoreResult<ConceptId> {
        self.define(label, ConceptKind::EntityType, sup)
    }

    /// Define a relationship type relating the given roles. Roles are created on
    /// first mention and may be shared between relationship types.
    pub fn define_relation_type(
        &self,
        label: &str,
        roles: &[&str],
        sup: Option<&str>,
    ) -> StoreResult<ConceptId> {
        let id = self.define(label, ConceptKind::RelationType, sup)?;
        for role in roles {
            let role = self.ensure_role(role)?;
            self.relates.entry(id).or_default().insert(role);
        }
        Ok(id)
    }

    /// Define an attribute type together with its implicit ownership
    /// relationship type and roles.
    pub fn define_attribute_type(
        &self,
        label: &str,
        value_type: ValueType,
        sup: Option<&str>,
    ) -> StoreResult<ConceptId> {
        let id = self.define(label, ConceptKind::AttributeType(value_type), sup)?;
        let owner_role = has_owner_label(label);
        let value_role = has_value_label(label);
        self.define_relation_type(&has_type_label(label), &[&owner_role, &value_role], None)?;
        let value_role = self.require(&value_role)?;
        self.plays.entry(id).or_default().insert(value_role);
        Ok(id)
    }

    /// Declare that instances of `ty` may play `role`.
    pub fn define_plays(&self, ty: &str, role: &str) -> StoreResult<()> {
        let ty = self.require(ty)?;
        let role = self.require(role)?;
        self.plays.entry(ty).or_default().insert(role);
        Ok(())
    }

    /// Declare that instances of `owner` may own `attribute`s; the owner type
    /// plays the implicit owner role.
    pub fn define_owns(&self, owner: &str, attribute: &str) -> StoreResult<()> {
        let owner_id = self.require(owner)?;
        let attribute_id = self.require(attribute)?;
        if !self.is_attribute_type(attribute_id) {
            return Err(StoreError::NotAnAttributeType {
                label: attribute.to_string(),
            });
        }
        self.owns.entry(owner_id).or_default().insert(attribute_id);
        let owner_role = self.require(&has_owner_label(attribute))?;
        self.plays.entry(owner_id).or_default().insert(owner_role);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Data
    // -----------------------------------------------------------------------

    fn ensure_node(&self, id: ConceptId) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&id) {
            return *idx.value();
        }
        let mut graph = self.graph.write().expect("graph lock poisoned");
        // Double-check after acquiring write lock
        if let Some(idx) = self.node_index.get(&id) {
            return *idx.value();
        }
        let idx = graph.add_node(id);
        self.node_index.insert(id, idx);
        idx
    }

    fn schema_of_kind(&self, ty: ConceptId) -> StoreResult<Concept> {
        let concept = self
            .concept(ty)
            .ok_or(StoreError::ConceptNotFound { id: ty.get() })?;
        if !concept.kind.is_type() {
            return Err(StoreError::NotAType { id: ty.get() });
        }
        Ok(concept)
    }

    fn create_instance(
        &self,
        ty: ConceptId,
        kind: ConceptKind,
        value: Option<Value>,
        inferred: bool,
    ) -> StoreResult<ConceptId> {
        let id = self.allocator.next_id()?;
        let mut concept = Concept::instance(id, kind, ty);
        concept.value = value;
        concept.inferred = inferred;
        self.concepts.insert(id, concept);
        self.instances.entry(ty).or_default().push(id);
        self.ensure_node(id);
        Ok(id)
    }

    /// Insert an entity of type `ty`.
    pub fn insert_entity(&self, ty: ConceptId) -> StoreResult<ConceptId> {
        let concept = self.schema_of_kind(ty)?;
        if concept.kind != ConceptKind::EntityType {
            return Err(StoreError::NotAType { id: ty.get() });
        }
        self.create_instance(ty, ConceptKind::Entity, None, false)
    }

    /// Insert (or find) the attribute of type `ty` holding `value`.
    pub fn insert_attribute(&self, ty: ConceptId, value: Value) -> StoreResult<ConceptId> {
        self.put_attribute(ty, &value, false)
    }

    /// Attach an attribute to its owner.
    pub fn insert_has(&self, owner: ConceptId, attribute: ConceptId) -> StoreResult<ConceptId> {
        self.attach(owner, attribute, false)
    }

    /// Insert (or find) a relationship of type `ty` with these role players.
    pub fn insert_relationship(
        &self,
        ty: ConceptId,
        role_players: &[(ConceptId, ConceptId)],
    ) -> StoreResult<ConceptId> {
        self.put_relationship(ty, role_players, false)
    }

    fn put_attribute(&self, ty: ConceptId, value: &Value, inferred: bool) -> StoreResult<ConceptId> {
        let concept = self.schema_of_kind(ty)?;
        let label = concept.label.clone().unwrap_or_default();
        let ConceptKind::AttributeType(expected) = concept.kind else {
            return Err(StoreError::NotAnAttributeType { label });
        };
        if value.value_type() != expected {
            return Err(StoreError::ValueTypeMismatch {
                label,
                expected: expected.to_string(),
                actual: value.value_type().to_string(),
            });
        }
        match self.attributes.entry((ty, value.clone())) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let id = self.create_instance(ty, ConceptKind::Attribute, Some(value.clone()), inferred)?;
                e.insert(id);
                if inferred {
                    tracing::info!(attribute = %id, attribute_type = %label, %value, "inferred attribute created");
                }
                Ok(id)
            }
        }
    }

    fn attach(&self, owner: ConceptId, attribute: ConceptId, inferred: bool) -> StoreResult<ConceptId> {
        if self.concept(owner).is_none() {
            return Err(StoreError::ConceptNotFound { id: owner.get() });
        }
        let attribute_type = self
            .type_of(attribute)
            .ok_or(StoreError::ConceptNotFound { id: attribute.get() })?;
        let (relation, owner_role, value_role) =
            self.implicit_ownership(attribute_type)
                .ok_or_else(|| StoreError::NotAnAttributeType {
                    label: self.label(attribute_type).unwrap_or_default(),
                })?;
        self.put_relationship(
            relation,
            &[(owner_role, owner), (value_role, attribute)],
            inferred,
        )
    }

    fn put_relationship(
        &self,
        ty: ConceptId,
        role_players: &[(ConceptId, ConceptId)],
        inferred: bool,
    ) -> StoreResult<ConceptId> {
        let concept = self.schema_of_kind(ty)?;
        if concept.kind != ConceptKind::RelationType {
            return Err(StoreError::NotAType { id: ty.get() });
        }
        let roles = self.relates(ty);
        for (role, player) in role_players {
            if !roles.contains(role) {
                return Err(StoreError::RoleNotRelated {
                    role: self.label(*role).unwrap_or_else(|| role.to_string()),
                    relation: concept.label.clone().unwrap_or_default(),
                });
            }
            if self.concept(*player).is_none() {
                return Err(StoreError::ConceptNotFound { id: player.get() });
            }
        }
        let mut key_players = role_players.to_vec();
        key_players.sort();
        match self.relationships.entry((ty, key_players)) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let id = self.create_instance(ty, ConceptKind::Relationship, None, inferred)?;
                let rel_idx = self.ensure_node(id);
                let player_idx: Vec<NodeIndex> =
                    role_players.iter().map(|(_, p)| self.ensure_node(*p)).collect();
                {
                    let mut graph = self.graph.write().expect("graph lock poisoned");
                    for ((role, _), idx) in role_players.iter().zip(player_idx) {
                        graph.add_edge(rel_idx, idx, RoleEdge { role: *role, inferred });
                    }
                }
                e.insert(id);
                if inferred {
                    tracing::info!(relationship = %id, relation_type = ?concept.label, "inferred relationship created");
                }
                Ok(id)
            }
        }
    }

    /// `(role, player)` pairs of a relationship.
    pub fn role_players_of(&self, relationship: ConceptId) -> Vec<(ConceptId, ConceptId)> {
        let Some(idx) = self.node_index.get(&relationship).map(|i| *i.value()) else {
            return vec![];
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut pairs: Vec<(ConceptId, ConceptId)> = graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| Some((e.weight().role, *graph.node_weight(e.target())?)))
            .collect();
        pairs.sort();
        pairs
    }

    /// Relationships `player` takes part in.
    pub fn relationships_of(&self, player: ConceptId) -> Vec<ConceptId> {
        let Some(idx) = self.node_index.get(&player).map(|i| *i.value()) else {
            return vec![];
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        let mut rels: Vec<ConceptId> = graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| graph.node_weight(e.source()).copied())
            .collect();
        rels.sort();
        rels.dedup();
        rels
    }

    /// Instances of `ty` or any of its subtypes.
    pub fn instances_of(&self, ty: ConceptId) -> Vec<ConceptId> {
        self.subtypes(ty)
            .into_iter()
            .flat_map(|t| {
                self.instances
                    .get(&t)
                    .map(|v| v.value().clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Every instance in the graph.
    pub fn all_instances(&self) -> Vec<ConceptId> {
        let mut all: Vec<ConceptId> = self
            .instances
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        all.sort();
        all
    }

    /// Number of concepts created by inference.
    pub fn inferred_count(&self) -> usize {
        self.concepts.iter().filter(|c| c.value().inferred).count()
    }

    /// Number of concepts, schema included.
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Number of role-player edges.
    pub fn edge_count(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").edge_count()
    }

    /// Whether an edge was written by inference.
    pub fn is_inferred_edge(&self, relationship: ConceptId, player: ConceptId) -> bool {
        let (Some(rel), Some(pl)) = (
            self.node_index.get(&relationship).map(|i| *i.value()),
            self.node_index.get(&player).map(|i| *i.value()),
        ) else {
            return false;
        };
        let graph = self.graph.read().expect("graph lock poisoned");
        graph
            .edges_connecting(rel, pl)
            .any(|e| e.weight().inferred)
    }

    fn attribute_types(&self) -> Vec<ConceptId> {
        let mut types: Vec<ConceptId> = self
            .concepts
            .iter()
            .filter(|c| matches!(c.value().kind, ConceptKind::AttributeType(_)))
            .map(|c| *c.key())
            .collect();
        types.sort();
        types
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    /// Whether an instance's direct type satisfies the atom's static type and a
    /// bound type variable. Returns the binding for a free user-defined type var.
    fn check_type(&self, atom: &Atom, partial: &Answer, ty: ConceptId) -> Option<Answer> {
        if let Some(t) = atom.type_id()
            && !self.is_subtype(ty, t)
        {
            return None;
        }
        let type_var = atom.predicate_var();
        match partial.get(type_var) {
            Some(bound) if self.is_subtype(ty, bound) => Some(partial.clone()),
            Some(_) => None,
            None if type_var.is_user_defined() => partial.extend(type_var.clone(), ty),
            None => Some(partial.clone()),
        }
    }

    fn typed_candidates(&self, ty: Option<ConceptId>, kind: ConceptKind) -> Vec<ConceptId> {
        match ty {
            Some(t) => self.instances_of(t),
            None => self
                .all_instances()
                .into_iter()
                .filter(|id| self.concept(*id).is_some_and(|c| c.kind == kind))
                .collect(),
        }
    }

    fn match_isa(&self, atom: &Atom, partial: &Answer, id: ConceptId) -> Option<Answer> {
        let concept = self.concept(id)?;
        if concept.kind.is_schema() {
            return None;
        }
        let answer = self.check_type(atom, partial, concept.type_id?)?;
        answer.extend(atom.var().clone(), id)
    }

    fn match_relationship(&self, atom: &Atom, partial: &Answer, rel: ConceptId) -> Vec<Answer> {
        let Some(concept) = self.concept(rel) else {
            return vec![];
        };
        if concept.kind != ConceptKind::Relationship {
            return vec![];
        }
        let Some(base) = concept
            .type_id
            .and_then(|ty| self.check_type(atom, partial, ty))
            .and_then(|a| a.extend(atom.var().clone(), rel))
        else {
            return vec![];
        };
        let edges = self.role_players_of(rel);
        let mut used = vec![false; edges.len()];
        let mut out = Vec::new();
        self.assign_role_players(atom.role_players(), &edges, &mut used, base, &mut out);
        out.sort_by(|a, b| a.iter().cmp(b.iter()));
        out.dedup();
        out
    }

    /// Backtracking assignment of atom role players to distinct edges.
    fn assign_role_players(
        &self,
        wanted: &[RolePlayer],
        edges: &[(ConceptId, ConceptId)],
        used: &mut [bool],
        answer: Answer,
        out: &mut Vec<Answer>,
    ) {
        let Some((first, rest)) = wanted.split_first() else {
            out.push(answer);
            return;
        };
        for (i, (role, player)) in edges.iter().enumerate() {
            if used[i] {
                continue;
            }
            if let Some(wanted_role) = first.role
                && !self.is_subtype(*role, wanted_role)
            {
                continue;
            }
            let Some(next) = answer.extend(first.player.clone(), *player) else {
                continue;
            };
            used[i] = true;
            self.assign_role_players(rest, edges, used, next, out);
            used[i] = false;
        }
    }

    fn match_resource(
        &self,
        atom: &Atom,
        partial: &Answer,
        (rel, owner_role, value_role): (ConceptId, ConceptId, ConceptId),
    ) -> Option<Answer> {
        let edges = self.role_players_of(rel);
        let owner = edges.iter().find(|(r, _)| *r == owner_role)?.1;
        let attribute = edges.iter().find(|(r, _)| *r == value_role)?.1;
        let mut answer = partial
            .extend(atom.var().clone(), owner)?
            .extend(atom.predicate_var().clone(), attribute)?;
        if let Some(relation_var) = atom.relation_var()
            && (relation_var.is_user_defined() || answer.contains_var(relation_var))
        {
            answer = answer.extend(relation_var.clone(), rel)?;
        }
        let value = self.value_of(attribute)?;
        for predicate in atom.value_predicates() {
            let holds = match predicate.operand() {
                Operand::Literal(_) => predicate.test_literal(&value).unwrap_or(true),
                Operand::Var(inner) => match answer.get(inner).and_then(|id| self.value_of(id)) {
                    Some(other) => predicate.comparator().test(&value, &other),
                    None => true,
                },
            };
            if !holds {
                return None;
            }
        }
        Some(answer)
    }

    fn resource_candidates(&self, atom: &Atom, partial: &Answer) -> Vec<(ConceptId, ConceptId, ConceptId)> {
        let attribute_types = match atom.type_id() {
            Some(t) => self.subtypes(t),
            None => self.attribute_types(),
        };
        let mut out = Vec::new();
        for attribute_type in attribute_types {
            let Some((relation, owner_role, value_role)) = self.implicit_ownership(attribute_type) else {
                continue;
            };
            let bound_relation = atom.relation_var().and_then(|v| partial.get(v));
            let rels = if let Some(rel) = bound_relation {
                vec![rel]
            } else if let Some(owner) = partial.get(atom.var()) {
                self.relationships_of(owner)
            } else if let Some(attribute) = partial.get(atom.predicate_var()) {
                self.relationships_of(attribute)
            } else {
                self.instances_of(relation)
            };
            out.extend(
                rels.into_iter()
                    .filter(|r| self.type_of(*r) == Some(relation))
                    .map(|r| (r, owner_role, value_role)),
            );
        }
        out
    }
}

impl Default for MemGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemGraph")
            .field("concepts", &self.concepts.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}

impl GraphStore for MemGraph {
    fn schema_concept(&self, label: &str) -> Option<ConceptId> {
        self.labels.get(label).map(|id| *id.value())
    }

    fn concept(&self, id: ConceptId) -> Option<Concept> {
        self.concepts.get(&id).map(|c| c.value().clone())
    }

    fn supertypes(&self, ty: ConceptId) -> Vec<ConceptId> {
        let mut out = vec![ty];
        let mut current = ty;
        while let Some(sup) = self.supertype.get(&current).map(|s| *s.value()) {
            if out.contains(&sup) {
                break;
            }
            out.push(sup);
            current = sup;
        }
        out
    }

    fn subtypes(&self, ty: ConceptId) -> Vec<ConceptId> {
        let mut out = vec![ty];
        let mut queue = VecDeque::from([ty]);
        while let Some(current) = queue.pop_front() {
            let children: Vec<ConceptId> = self
                .supertype
                .iter()
                .filter(|e| *e.value() == current)
                .map(|e| *e.key())
                .collect();
            for child in children {
                if !out.contains(&child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    fn plays(&self, ty: ConceptId) -> Vec<ConceptId> {
        let roles: BTreeSet<ConceptId> = self
            .supertypes(ty)
            .into_iter()
            .flat_map(|t| self.plays.get(&t).map(|r| r.value().clone()).unwrap_or_default())
            .collect();
        roles.into_iter().collect()
    }

    fn relates(&self, relation_type: ConceptId) -> Vec<ConceptId> {
        let roles: BTreeSet<ConceptId> = self
            .supertypes(relation_type)
            .into_iter()
            .flat_map(|t| self.relates.get(&t).map(|r| r.value().clone()).unwrap_or_default())
            .collect();
        roles.into_iter().collect()
    }

    fn owns(&self, owner_type: ConceptId, attribute_type: ConceptId) -> bool {
        let attribute_supers = self.supertypes(attribute_type);
        self.supertypes(owner_type).into_iter().any(|t| {
            self.owns
                .get(&t)
                .is_some_and(|owned| attribute_supers.iter().any(|a| owned.contains(a)))
        })
    }

    fn match_atom<'s>(&'s self, atom: &Atom, partial: &Answer) -> AnswerIter<'s> {
        let mut seeded = partial.clone();
        for predicate in atom.id_predicates() {
            match seeded.extend(predicate.var().clone(), predicate.concept()) {
                Some(next) => seeded = next,
                None => return Box::new(std::iter::empty()),
            }
        }
        let atom = atom.clone();
        match atom.tag() {
            AtomTag::Isa => {
                let candidates = match seeded.get(atom.var()) {
                    Some(id) => vec![id],
                    None => {
                        let ty = seeded.get(atom.predicate_var()).or(atom.type_id());
                        match ty {
                            Some(t) => self.instances_of(t),
                            None => self.all_instances(),
                        }
                    }
                };
                Box::new(
                    candidates
                        .into_iter()
                        .filter_map(move |id| self.match_isa(&atom, &seeded, id)),
                )
            }
            AtomTag::Relationship => {
                let bound_player = atom.role_players().iter().find_map(|rp| seeded.get(&rp.player));
                let candidates = match (seeded.get(atom.var()), bound_player) {
                    (Some(id), _) => vec![id],
                    (None, Some(player)) => self.relationships_of(player),
                    (None, None) => self.typed_candidates(atom.type_id(), ConceptKind::Relationship),
                };
                Box::new(
                    candidates
                        .into_iter()
                        .flat_map(move |rel| self.match_relationship(&atom, &seeded, rel)),
                )
            }
            AtomTag::Resource => {
                let candidates = self.resource_candidates(&atom, &seeded);
                Box::new(
                    candidates
                        .into_iter()
                        .filter_map(move |c| self.match_resource(&atom, &seeded, c)),
                )
            }
        }
    }

    fn put_attribute_inferred(&self, attribute_type: ConceptId, value: &Value) -> StoreResult<ConceptId> {
        self.put_attribute(attribute_type, value, true)
    }

    fn attach_attribute_inferred(&self, owner: ConceptId, attribute: ConceptId) -> StoreResult<ConceptId> {
        self.attach(owner, attribute, true)
    }

    fn put_relationship_inferred(
        &self,
        relation_type: ConceptId,
        role_players: &[(ConceptId, ConceptId)],
    ) -> StoreResult<ConceptId> {
        self.put_relationship(relation_type, role_players, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Comparator, ValuePredicate};
    use crate::var::Var;

    fn people() -> (MemGraph, ConceptId, ConceptId) {
        let g = MemGraph::new();
        let person = g.define_entity_type("person", None).unwrap();
        let age = g.define_attribute_type("age", ValueType::Long, None).unwrap();
        g.define_owns("person", "age").unwrap();
        (g, person, age)
    }

    #[test]
    fn duplicate_label_rejected() {
        let (g, _, _) = people();
        let err = g.define_entity_type("person", None).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateLabel { .. }));
    }

    #[test]
    fn attribute_type_defines_implicit_ownership() {
        let (g, person, age) = people();
        let (rel, owner_role, value_role) = g.implicit_ownership(age).unwrap();
        assert_eq!(g.label(rel).as_deref(), Some("@has-age"));
        assert!(g.plays(person).contains(&owner_role));
        assert!(g.plays(age).contains(&value_role));
        assert!(g.owns(person, age));
        assert_eq!(g.attribute_type_of_implicit(rel), Some(age));
    }

    #[test]
    fn subtypes_and_supertypes_are_inclusive() {
        let (g, person, _) = people();
        let man = g.define_entity_type("man", Some("person")).unwrap();
        assert_eq!(g.supertypes(man), vec![man, person]);
        assert_eq!(g.subtypes(person), vec![person, man]);
        assert!(g.is_subtype(man, person));
        assert!(!g.is_subtype(person, man));
    }

    #[test]
    fn attributes_are_unique_per_type_and_value() {
        let (g, _, age) = people();
        let a = g.put_attribute_inferred(age, &Value::Long(30)).unwrap();
        let b = g.put_attribute_inferred(age, &Value::Long(30)).unwrap();
        let c = g.insert_attribute(age, Value::Long(31)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(g.instances_of(age).len(), 2);
    }

    #[test]
    fn attribute_value_type_checked() {
        let (g, _, age) = people();
        let err = g.insert_attribute(age, Value::from("thirty")).unwrap_err();
        assert!(matches!(err, StoreError::ValueTypeMismatch { .. }));
    }

    #[test]
    fn attach_is_idempotent() {
        let (g, person, age) = people();
        let alice = g.insert_entity(person).unwrap();
        let thirty = g.insert_attribute(age, Value::Long(30)).unwrap();
        let r1 = g.attach_attribute_inferred(alice, thirty).unwrap();
        let r2 = g.attach_attribute_inferred(alice, thirty).unwrap();
        assert_eq!(r1, r2);
        assert_eq!(g.edge_count(), 2);
        assert!(g.is_inferred_edge(r1, alice));
    }

    #[test]
    fn relationship_roles_checked() {
        let (g, person, _) = people();
        let marriage = g.define_relation_type("marriage", &["spouse"], None).unwrap();
        let age_owner = g.require("@has-age-owner").unwrap();
        let alice = g.insert_entity(person).unwrap();
        let err = g.insert_relationship(marriage, &[(age_owner, alice)]).unwrap_err();
        assert!(matches!(err, StoreError::RoleNotRelated { .. }));
    }

    #[test]
    fn match_resource_with_predicate() {
        let (g, person, age) = people();
        let alice = g.insert_entity(person).unwrap();
        let bob = g.insert_entity(person).unwrap();
        let thirty = g.insert_attribute(age, Value::Long(30)).unwrap();
        let forty = g.insert_attribute(age, Value::Long(40)).unwrap();
        g.insert_has(alice, thirty).unwrap();
        g.insert_has(bob, forty).unwrap();

        let a = Var::named("a");
        let atom = Atom::resource(
            Var::named("x"),
            Some(age),
            a.clone(),
            vec![ValuePredicate::compare(a, Comparator::Gt, 35)],
        )
        .unwrap();
        let answers: Vec<Answer> = g.match_atom(&atom, &Answer::empty()).collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(&Var::named("x")), Some(bob));
    }

    #[test]
    fn match_relationship_both_orders() {
        let (g, person, _) = people();
        let marriage = g.define_relation_type("marriage", &["spouse"], None).unwrap();
        let spouse = g.require("spouse").unwrap();
        let alice = g.insert_entity(person).unwrap();
        let bob = g.insert_entity(person).unwrap();
        g.insert_relationship(marriage, &[(spouse, alice), (spouse, bob)])
            .unwrap();

        let atom = Atom::relationship(
            Var::named("m"),
            Some(marriage),
            vec![
                RolePlayer::new(Some(spouse), Var::named("x")),
                RolePlayer::new(Some(spouse), Var::named("y")),
            ],
        );
        assert_eq!(g.match_atom(&atom, &Answer::empty()).count(), 2);

        let bound = Answer::from_pairs([(Var::named("x"), alice)]);
        let answers: Vec<Answer> = g.match_atom(&atom, &bound).collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(&Var::named("y")), Some(bob));
    }

    #[test]
    fn match_isa_respects_hierarchy() {
        let (g, person, _) = people();
        let man = g.define_entity_type("man", Some("person")).unwrap();
        g.insert_entity(person).unwrap();
        g.insert_entity(man).unwrap();
        let all = Atom::isa(Var::named("x"), Some(person));
        let men = Atom::isa(Var::named("x"), Some(man));
        assert_eq!(g.match_atom(&all, &Answer::empty()).count(), 2);
        assert_eq!(g.match_atom(&men, &Answer::empty()).count(), 1);
    }
}
