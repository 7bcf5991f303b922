//! `DEF`/`USE` symbol table.
//!
//! Every binding in a parsed unit is registered before traversal starts, so
//! a `USE` resolves regardless of whether its `DEF` appears earlier or later
//! in the text. The table is read-only once built and is shared by
//! reference across traversal workers.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{Node, NodeId};

/// A `USE` named a binding that was never declared.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing binding '{name}' for USE reference")]
pub struct BindingError {
    pub name: String,
}

/// Mapping from `DEF` name to the node that declared it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingTable {
    entries: HashMap<String, NodeId>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `DEF` in an arena, in arena order.
    pub fn populate(nodes: &[Node]) -> Self {
        let mut table = Self::new();
        for (id, node) in nodes.iter().enumerate() {
            if let Some(name) = &node.binding {
                table.register(name, id);
            }
        }
        log::debug!("Registered {} bindings", table.len());
        table
    }

    /// Store a binding. A name that is already bound keeps its first node;
    /// returns `false` in that case.
    pub fn register(&mut self, name: &str, id: NodeId) -> bool {
        if let Some(&existing) = self.entries.get(name) {
            log::warn!(
                "Binding '{}' redeclared by node {}, keeping node {}",
                name,
                id,
                existing
            );
            return false;
        }
        self.entries.insert(name.to_string(), id);
        true
    }

    pub fn resolve(&self, name: &str) -> Result<NodeId, BindingError> {
        self.entries.get(name).copied().ok_or_else(|| BindingError {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let mut table = BindingTable::new();
        assert!(table.register("Wheel", 3));
        assert_eq!(table.resolve("Wheel").unwrap(), 3);
        assert!(table.contains("Wheel"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut table = BindingTable::new();
        assert!(table.register("A", 0));
        assert!(!table.register("A", 7));
        assert_eq!(table.resolve("A").unwrap(), 0);
    }

    #[test]
    fn test_missing_binding() {
        let table = BindingTable::new();
        let err = table.resolve("Missing").unwrap_err();
        assert_eq!(err.name, "Missing");
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut table = BindingTable::new();
        table.register("box", 1);
        assert!(table.resolve("Box").is_err());
    }
}
