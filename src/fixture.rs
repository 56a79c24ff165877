//! Structured fixtures: a schema, its data, rules and one query, as JSON.
//!
//! Fixtures drive the `tgr` binary and the integration tests. They describe atoms
//! structurally; there is no query language here.
//!
//! ```json
//! {
//!   "schema": {
//!     "entities": [{ "label": "person", "owns": ["age"] }],
//!     "attributes": [{ "label": "age", "value_type": "long" }]
//!   },
//!   "data": [{ "kind": "entity", "name": "alice", "type": "person" }],
//!   "rules": [{
//!     "label": "everyone-is-thirty",
//!     "when": [{ "atom": "isa", "var": "x", "type": "person" }],
//!     "then": [{ "atom": "has", "owner": "x", "attribute": "age",
//!                "predicates": [{ "op": "=", "value": 30 }] }]
//!   }],
//!   "query": [{ "atom": "has", "owner": "p", "attribute": "age", "value_var": "a" }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answer::Answer;
use crate::atom::{Atom, RolePlayer};
use crate::concept::{ConceptId, Value, ValueType};
use crate::error::ReasonerResult;
use crate::predicate::{Comparator, Operand, ValuePredicate};
use crate::query::{QueryArena, QueryId};
use crate::rule::{InferenceRule, RuleSet};
use crate::store::MemGraph;
use crate::var::Var;

/// Errors from fixture loading.
#[derive(Debug, Error, Diagnostic)]
pub enum FixtureError {
    #[error("failed to read fixture: {path}")]
    #[diagnostic(
        code(tgr::fixture::read),
        help("Ensure the fixture file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {path}: {message}")]
    #[diagnostic(
        code(tgr::fixture::parse),
        help("Fixtures are JSON with `schema`, `data`, `rules` and `query` sections.")
    )]
    Parse { path: String, message: String },

    #[error("unknown instance: {name}")]
    #[diagnostic(
        code(tgr::fixture::unknown_instance),
        help("Declare the instance in the `data` section before referring to it.")
    )]
    UnknownInstance { name: String },

    #[error("duplicate instance name: {name}")]
    #[diagnostic(
        code(tgr::fixture::duplicate_instance),
        help("Instance names in the `data` section must be unique.")
    )]
    DuplicateInstance { name: String },

    #[error("value predicate on {var} needs exactly one of `value` or `var`")]
    #[diagnostic(
        code(tgr::fixture::malformed_predicate),
        help("Write `{{\"op\": \">\", \"value\": 30}}` or `{{\"op\": \">\", \"var\": \"b\"}}`.")
    )]
    MalformedPredicate { var: String },
}

// ---------------------------------------------------------------------------
// Fixture description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub schema: SchemaSpec,
    #[serde(default)]
    pub data: Vec<InstanceSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    pub query: Vec<AtomSpec>,
    /// Query variables bound to named instances before resolution.
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    #[serde(default)]
    pub entities: Vec<TypeSpec>,
    #[serde(default)]
    pub relations: Vec<RelationTypeSpec>,
    #[serde(default)]
    pub attributes: Vec<AttributeTypeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSpec {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub plays: Vec<String>,
    #[serde(default)]
    pub owns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationTypeSpec {
    pub label: String,
    pub relates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub plays: Vec<String>,
    #[serde(default)]
    pub owns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeTypeSpec {
    pub label: String,
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub owns: Vec<String>,
}

/// A named data instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstanceSpec {
    Entity {
        name: String,
        #[serde(rename = "type")]
        type_label: String,
        /// Attribute label to value.
        #[serde(default)]
        has: BTreeMap<String, Value>,
    },
    Relationship {
        name: String,
        #[serde(rename = "type")]
        type_label: String,
        players: Vec<PlayerSpec>,
        #[serde(default)]
        has: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSpec {
    pub role: String,
    pub player: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub label: String,
    pub when: Vec<AtomSpec>,
    pub then: Vec<AtomSpec>,
}

/// A structural atom. Variable names may carry a leading `$`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "atom", rename_all = "snake_case")]
pub enum AtomSpec {
    Isa {
        var: String,
        #[serde(rename = "type", default)]
        type_label: Option<String>,
    },
    Relationship {
        #[serde(default)]
        var: Option<String>,
        #[serde(rename = "type", default)]
        type_label: Option<String>,
        players: Vec<RolePlayerSpec>,
    },
    Has {
        owner: String,
        #[serde(default)]
        attribute: Option<String>,
        #[serde(default)]
        value_var: Option<String>,
        #[serde(default)]
        relation_var: Option<String>,
        #[serde(default)]
        predicates: Vec<PredicateSpec>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePlayerSpec {
    #[serde(default)]
    pub role: Option<String>,
    pub player: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateSpec {
    pub op: Comparator,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub var: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Everything a fixture describes, built and ready to resolve.
#[derive(Debug)]
pub struct LoadedFixture {
    pub graph: MemGraph,
    pub arena: QueryArena,
    pub rules: RuleSet,
    pub query: QueryId,
    /// Data instances by fixture name.
    pub instances: BTreeMap<String, ConceptId>,
}

impl Fixture {
    pub fn from_json_str(json: &str) -> Result<Self, FixtureError> {
        serde_json::from_str(json).map_err(|e| FixtureError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|e| FixtureError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| FixtureError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Build the store, rules and query this fixture describes.
    pub fn build(&self) -> ReasonerResult<LoadedFixture> {
        let graph = MemGraph::new();
        self.define_schema(&graph)?;
        let instances = self.insert_data(&graph)?;

        let mut arena = QueryArena::new();
        let mut rules = RuleSet::new();
        for rule in &self.rules {
            let body = to_atoms(&graph, &rule.when)?;
            let head = to_atoms(&graph, &rule.then)?;
            let body = arena.insert(body);
            let head = arena.insert(head);
            rules.add(InferenceRule::new(rule.label.clone(), body, head));
        }

        let mut substitution = Answer::empty();
        for (var, name) in &self.bindings {
            let id = *instances
                .get(name)
                .ok_or_else(|| FixtureError::UnknownInstance { name: name.clone() })?;
            substitution = substitution
                .extend(Var::named(var.as_str()), id)
                .ok_or_else(|| FixtureError::DuplicateInstance { name: var.clone() })?;
        }
        let query = arena.insert_with_substitution(to_atoms(&graph, &self.query)?, substitution);
        tracing::info!(
            concepts = graph.concept_count(),
            rules = rules.len(),
            atoms = self.query.len(),
            "fixture loaded"
        );
        Ok(LoadedFixture {
            graph,
            arena,
            rules,
            query,
            instances,
        })
    }

    fn define_schema(&self, graph: &MemGraph) -> ReasonerResult<()> {
        // Attribute types first: they may be owned by entity and relation types.
        for attr in &self.schema.attributes {
            graph.define_attribute_type(&attr.label, attr.value_type, attr.sub.as_deref())?;
        }
        for entity in &self.schema.entities {
            graph.define_entity_type(&entity.label, entity.sub.as_deref())?;
        }
        for relation in &self.schema.relations {
            let roles: Vec<&str> = relation.relates.iter().map(String::as_str).collect();
            graph.define_relation_type(&relation.label, &roles, relation.sub.as_deref())?;
        }

        let plays_and_owns = self
            .schema
            .entities
            .iter()
            .map(|t| (&t.label, &t.plays, &t.owns))
            .chain(
                self.schema
                    .relations
                    .iter()
                    .map(|t| (&t.label, &t.plays, &t.owns)),
            );
        for (label, plays, owns) in plays_and_owns {
            for role in plays {
                graph.define_plays(label, role)?;
            }
            for attribute in owns {
                graph.define_owns(label, attribute)?;
            }
        }
        for attr in &self.schema.attributes {
            for attribute in &attr.owns {
                graph.define_owns(&attr.label, attribute)?;
            }
        }
        Ok(())
    }

    fn insert_data(&self, graph: &MemGraph) -> ReasonerResult<BTreeMap<String, ConceptId>> {
        let mut instances = BTreeMap::new();
        let mut name_instance = |name: &str, id: ConceptId| {
            if instances.insert(name.to_string(), id).is_some() {
                return Err(FixtureError::DuplicateInstance { name: name.into() });
            }
            Ok(())
        };

        let mut owned = Vec::new();
        for instance in &self.data {
            if let InstanceSpec::Entity {
                name,
                type_label,
                has,
            } = instance
            {
                let id = graph.insert_entity(graph.require(type_label)?)?;
                name_instance(name, id)?;
                owned.push((id, has));
            }
        }
        // Relationships after entities, so players can be referred to by name.
        let mut pending = Vec::new();
        for instance in &self.data {
            if let InstanceSpec::Relationship {
                name,
                type_label,
                players,
                has,
            } = instance
            {
                pending.push((name, type_label, players, has));
            }
        }
        for (name, type_label, players, has) in pending {
            let mut role_players = Vec::with_capacity(players.len());
            for p in players {
                let player = *instances
                    .get(&p.player)
                    .ok_or_else(|| FixtureError::UnknownInstance {
                        name: p.player.clone(),
                    })?;
                role_players.push((graph.require(&p.role)?, player));
            }
            let id = graph.insert_relationship(graph.require(type_label)?, &role_players)?;
            if instances.insert(name.clone(), id).is_some() {
                return Err(FixtureError::DuplicateInstance { name: name.clone() }.into());
            }
            owned.push((id, has));
        }

        for (owner, has) in owned {
            for (label, value) in has {
                let attribute = graph.insert_attribute(graph.require(label)?, value.clone())?;
                graph.insert_has(owner, attribute)?;
            }
        }
        Ok(instances)
    }
}

/// Load and build a fixture file.
pub fn load(path: &Path) -> ReasonerResult<LoadedFixture> {
    Fixture::load(path)?.build()
}

fn resolve_type(graph: &MemGraph, label: Option<&String>) -> ReasonerResult<Option<ConceptId>> {
    Ok(label.map(|l| graph.require(l)).transpose()?)
}

fn to_atoms(graph: &MemGraph, specs: &[AtomSpec]) -> ReasonerResult<Vec<Atom>> {
    specs.iter().map(|spec| to_atom(graph, spec)).collect()
}

fn to_atom(graph: &MemGraph, spec: &AtomSpec) -> ReasonerResult<Atom> {
    match spec {
        AtomSpec::Isa { var, type_label } => Ok(Atom::isa(
            Var::named(var.as_str()),
            resolve_type(graph, type_label.as_ref())?,
        )),
        AtomSpec::Relationship {
            var,
            type_label,
            players,
        } => {
            let mut role_players = Vec::with_capacity(players.len());
            for p in players {
                role_players.push(RolePlayer::new(
                    resolve_type(graph, p.role.as_ref())?,
                    Var::named(p.player.as_str()),
                ));
            }
            let var = var.as_deref().map(Var::named).unwrap_or_else(Var::fresh);
            Ok(Atom::relationship(
                var,
                resolve_type(graph, type_label.as_ref())?,
                role_players,
            ))
        }
        AtomSpec::Has {
            owner,
            attribute,
            value_var,
            relation_var,
            predicates,
        } => {
            let value_var = value_var.as_deref().map(Var::named).unwrap_or_else(Var::fresh);
            let predicates = predicates
                .iter()
                .map(|p| {
                    let operand = match (&p.value, &p.var) {
                        (Some(value), None) => Operand::Literal(value.clone()),
                        (None, Some(inner)) => Operand::Var(Var::named(inner.as_str())),
                        _ => {
                            return Err(FixtureError::MalformedPredicate {
                                var: value_var.to_string(),
                            });
                        }
                    };
                    Ok(ValuePredicate::new(value_var.clone(), p.op, operand))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let atom = Atom::resource(
                Var::named(owner.as_str()),
                resolve_type(graph, attribute.as_ref())?,
                value_var,
                predicates,
            )?;
            Ok(match relation_var {
                Some(r) => atom.with_relation_var(Var::named(r.as_str())),
                None => atom,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReasonerError, StoreError};
    use crate::store::GraphStore;

    const FAMILY: &str = r#"{
        "schema": {
            "entities": [{ "label": "person", "plays": ["parent", "child"], "owns": ["name"] }],
            "relations": [{ "label": "parenthood", "relates": ["parent", "child"] }],
            "attributes": [{ "label": "name", "value_type": "string" }]
        },
        "data": [
            { "kind": "entity", "name": "alice", "type": "person", "has": { "name": "Alice" } },
            { "kind": "entity", "name": "bob", "type": "person" },
            { "kind": "relationship", "name": "p1", "type": "parenthood",
              "players": [{ "role": "parent", "player": "alice" }, { "role": "child", "player": "bob" }] }
        ],
        "query": [
            { "atom": "relationship", "type": "parenthood",
              "players": [{ "role": "parent", "player": "x" }, { "role": "child", "player": "y" }] },
            { "atom": "has", "owner": "x", "attribute": "name", "value_var": "n",
              "predicates": [{ "op": "contains", "value": "Ali" }] }
        ],
        "bindings": { "y": "bob" }
    }"#;

    #[test]
    fn builds_schema_data_and_query() {
        let loaded = Fixture::from_json_str(FAMILY).unwrap().build().unwrap();
        let alice = loaded.instances["alice"];
        let bob = loaded.instances["bob"];
        let p1 = loaded.instances["p1"];
        assert_eq!(loaded.graph.role_players_of(p1).len(), 2);
        assert_eq!(loaded.graph.relationships_of(alice).len(), 2);

        let query = loaded.arena.query(loaded.query).unwrap();
        assert_eq!(query.len(), 2);
        assert_eq!(query.substitution().get(&Var::named("y")), Some(bob));
        assert!(query.atoms()[1].is_resource());
        assert_eq!(
            query.atoms()[1].type_id(),
            loaded.graph.schema_concept("name")
        );
    }

    #[test]
    fn rules_are_loaded() {
        let json = r#"{
            "schema": {
                "entities": [{ "label": "person", "owns": ["age"] }],
                "attributes": [{ "label": "age", "value_type": "long" }]
            },
            "rules": [{
                "label": "thirty",
                "when": [{ "atom": "isa", "var": "x", "type": "person" }],
                "then": [{ "atom": "has", "owner": "x", "attribute": "age",
                           "value_var": "a", "predicates": [{ "op": "=", "value": 30 }] }]
            }],
            "query": [{ "atom": "isa", "var": "x", "type": "person" }]
        }"#;
        let loaded = Fixture::from_json_str(json).unwrap().build().unwrap();
        let rule = loaded.rules.get("thirty").unwrap();
        let head = rule.head_atom(&loaded.arena).unwrap();
        assert!(head.value_predicates()[0].is_specific());
        assert!(loaded.rules.validate(&loaded.arena, &loaded.graph).unwrap().is_empty());
    }

    #[test]
    fn unknown_type_is_a_store_error() {
        let json = r#"{ "query": [{ "atom": "isa", "var": "x", "type": "unicorn" }] }"#;
        let err = Fixture::from_json_str(json).unwrap().build().unwrap_err();
        assert!(matches!(err, ReasonerError::Store(StoreError::UnknownLabel { .. })));
    }

    #[test]
    fn unknown_player_is_reported() {
        let json = r#"{
            "schema": {
                "entities": [{ "label": "person", "plays": ["friend"] }],
                "relations": [{ "label": "friendship", "relates": ["friend"] }]
            },
            "data": [{ "kind": "relationship", "name": "f", "type": "friendship",
                       "players": [{ "role": "friend", "player": "ghost" }] }],
            "query": [{ "atom": "isa", "var": "x", "type": "person" }]
        }"#;
        let err = Fixture::from_json_str(json).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            ReasonerError::Fixture(FixtureError::UnknownInstance { .. })
        ));
    }

    #[test]
    fn predicate_needs_value_or_var() {
        let json = r#"{
            "schema": {
                "entities": [{ "label": "person", "owns": ["age"] }],
                "attributes": [{ "label": "age", "value_type": "long" }]
            },
            "query": [{ "atom": "has", "owner": "x", "attribute": "age",
                        "predicates": [{ "op": ">" }] }]
        }"#;
        let err = Fixture::from_json_str(json).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            ReasonerError::Fixture(FixtureError::MalformedPredicate { .. })
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("family.json");
        std::fs::write(&path, FAMILY).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.instances.len(), 3);

        let missing = Fixture::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, FixtureError::Read { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            Fixture::from_json_str("{ not json").unwrap_err(),
            FixtureError::Parse { .. }
        ));
    }
}
