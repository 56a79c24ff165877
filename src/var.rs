//! Query variables.
//!
//! A [`Var`] is an opaque name placeholder. Variables written by the user are
//! *user-defined*; variables the reasoner introduces (implicit relation variables,
//! type holders) are anonymous. Identity is the name plus whether the reasoner
//! generated it, so a fresh `$_0` never aliases a user's `$_0`. Rewriting a
//! variable to its user-defined form keeps it the same variable.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(0);

/// A named variable of a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Var {
    name: String,
    user_defined: bool,
    #[serde(default)]
    generated: bool,
}

impl Var {
    /// A user-defined variable, e.g. `$x`. A leading `$` is stripped.
    pub fn named(name: impl Into<String>) -> Self {
        let name: String = name.into();
        let name = name.strip_prefix('$').map(str::to_string).unwrap_or(name);
        Self {
            name,
            user_defined: true,
            generated: false,
        }
    }

    /// A fresh system-generated variable with a process-unique name.
    pub fn fresh() -> Self {
        let n = NEXT_ANONYMOUS.fetch_add(1, AtomicOrdering::Relaxed);
        Self {
            name: format!("_{n}"),
            user_defined: false,
            generated: true,
        }
    }

    /// A fresh variable with the same user-defined flag, used to keep a rule's
    /// variables apart from the query it is applied to.
    pub fn renamed_apart(&self) -> Self {
        Self {
            user_defined: self.user_defined,
            ..Self::fresh()
        }
    }

    /// The variable name without the `$` sigil.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_user_defined(&self) -> bool {
        self.user_defined
    }

    /// The same variable, flagged as user-defined.
    pub fn as_user_defined(&self) -> Self {
        Self {
            name: self.name.clone(),
            user_defined: true,
            generated: self.generated,
        }
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.generated == other.generated && self.name == other.name
    }
}

impl Eq for Var {}

impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.generated.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for Var {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Var {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.generated, &self.name).cmp(&(other.generated, &other.name))
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.name)
    }
}
