//! Reasoner configuration, persisted as TOML.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unifier::MergePolicy;

/// Errors from configuration loading and saving.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read reasoner config: {path}")]
    #[diagnostic(
        code(tgr::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse reasoner config: {path}: {message}")]
    #[diagnostic(
        code(tgr::config::parse),
        help(
            "Check the TOML syntax. Known keys: supernode_threshold, memoize_supernodes, \
             merge_policy (\"strict\" or \"overwrite\"), max_rule_depth."
        )
    )]
    Parse { path: String, message: String },

    #[error("failed to write reasoner config: {path}")]
    #[diagnostic(
        code(tgr::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Tuning knobs for a [`crate::reasoner::Reasoner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Matches beyond which a pattern counts as a supernode.
    #[serde(default = "default_supernode_threshold")]
    pub supernode_threshold: usize,
    /// Remember supernode status per pattern for the lifetime of a reasoner.
    #[serde(default = "default_memoize_supernodes")]
    pub memoize_supernodes: bool,
    /// Conflict policy when merging unifiers.
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Maximum nesting of rule applications.
    #[serde(default = "default_max_rule_depth")]
    pub max_rule_depth: usize,
}

fn default_supernode_threshold() -> usize {
    5
}
fn default_memoize_supernodes() -> bool {
    true
}
fn default_max_rule_depth() -> usize {
    8
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            supernode_threshold: default_supernode_threshold(),
            memoize_supernodes: default_memoize_supernodes(),
            merge_policy: MergePolicy::default(),
            max_rule_depth: default_max_rule_depth(),
        }
    }
}

impl ReasonerConfig {
    /// Parse from TOML text; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
