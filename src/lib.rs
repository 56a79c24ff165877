// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # tgr
//!
//! A rule-based backward-chaining reasoner for typed graph databases.
//!
//! ## Architecture
//!
//! - **Atoms** (`atom`): isa, relationship and attribute-ownership patterns with
//!   rewriting, alpha-equivalence, unification and materialisation
//! - **Planning** (`plan`): priority-ordered atom resolution with capped
//!   supernode probing
//! - **Resolution** (`reasoner`): lazy answer streams, rule application and
//!   loop-safe recursion
//! - **Store contract** (`store`): the `GraphStore` trait and the in-memory
//!   `MemGraph` (petgraph + DashMap)
//!
//! ## Library usage
//!
//! ```no_run
//! use tgr::atom::Atom;
//! use tgr::config::ReasonerConfig;
//! use tgr::query::QueryArena;
//! use tgr::reasoner::Reasoner;
//! use tgr::rule::RuleSet;
//! use tgr::store::MemGraph;
//! use tgr::var::Var;
//!
//! let graph = MemGraph::new();
//! let person = graph.define_entity_type("person", None).unwrap();
//! graph.insert_entity(person).unwrap();
//!
//! let mut arena = QueryArena::new();
//! let query = arena.insert(vec![Atom::isa(Var::named("x"), Some(person))]);
//! let rules = RuleSet::new();
//! let reasoner = Reasoner::new(&graph, &arena, &rules, ReasonerConfig::default());
//! for answer in reasoner.resolve(query).unwrap() {
//!     println!("{}", answer.unwrap());
//! }
//! ```

pub mod answer;
pub mod atom;
pub mod concept;
pub mod config;
pub mod error;
pub mod fixture;
pub mod plan;
pub mod predicate;
pub mod query;
pub mod reasoner;
pub mod rule;
pub mod store;
pub mod unifier;
pub mod var;
