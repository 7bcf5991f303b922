//! Traversal configuration.
//!
//! Configs are plain data and can be loaded from JSON:
//!
//! ```json
//! { "parallelism": 4, "parallelThreshold": 32, "synonyms": { "Cube": "Box" } }
//! ```
//!
//! Missing keys take their [`Default`] values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::headers::{CanonicalHeaderTable, HeaderTableError};

/// Errors loading or checking a config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Worker threads for sibling fan-out. 0 uses every core, 1 disables the
    /// worker pool entirely.
    pub parallelism: usize,

    /// Minimum number of nodes in a set of sibling subtrees before they are
    /// handed to the worker pool.
    pub parallel_threshold: usize,

    /// Deepest nesting the traversal will follow, counting `USE` hops.
    pub max_depth: usize,

    /// Extra header spellings, `synonym -> canonical`.
    pub synonyms: BTreeMap<String, String>,

    /// Skip nodes with an unknown header (and everything below them)
    /// instead of rejecting the document.
    pub ignore_unknown_node: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallelism: 0,
            parallel_threshold: 64,
            max_depth: 512,
            synonyms: BTreeMap::new(),
            ignore_unknown_node: false,
        }
    }
}

impl Config {
    /// Single-threaded traversal with default limits.
    pub fn sequential() -> Self {
        Self::default().with_parallelism(1)
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_ignore_unknown_node(mut self, ignore: bool) -> Self {
        self.ignore_unknown_node = ignore;
        self
    }

    pub fn with_synonym(mut self, synonym: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.synonyms.insert(synonym.into(), canonical.into());
        self
    }

    /// Parse and check a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "maxDepth",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some((synonym, _)) = self.synonyms.iter().find(|(s, _)| s.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "synonyms",
                message: format!("empty synonym '{}'", synonym),
            });
        }
        Ok(())
    }

    /// The builtin header table extended with this config's synonyms.
    pub fn header_table(&self) -> Result<CanonicalHeaderTable, HeaderTableError> {
        CanonicalHeaderTable::builtin().with_synonyms(&self.synonyms)
    }
}
