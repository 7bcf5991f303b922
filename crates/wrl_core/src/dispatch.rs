//! Handler registry keyed by canonical node type.
//!
//! The dispatch table is the only extension point for node semantics: the
//! traversal engine validates, resolves and merges, and everything a node
//! type *means* lives in the handler registered for it.

use std::collections::HashMap;

use crate::context::ConversionContext;
use crate::error::HandlerError;
use crate::headers::NodeType;
use crate::traverse::HandlerParams;

/// Turns a validated node into contributions.
///
/// A handler receives the node's view, an empty context to fill and the
/// ability to traverse child nodes with the same engine. It returns the
/// filled context. Handlers are shared between worker threads, so any
/// per-node state belongs inside `handle`.
pub trait Handler<T>: Send + Sync {
    fn handle(&self, params: HandlerParams<'_, T>) -> Result<ConversionContext<T>, HandlerError>;
}

impl<T, F> Handler<T> for F
where
    F: Fn(HandlerParams<'_, T>) -> Result<ConversionContext<T>, HandlerError> + Send + Sync,
{
    fn handle(&self, params: HandlerParams<'_, T>) -> Result<ConversionContext<T>, HandlerError> {
        self(params)
    }
}

/// Mapping from node type to the handler that converts it.
pub struct DispatchTable<T> {
    handlers: HashMap<NodeType, Box<dyn Handler<T>>>,
}

impl<T> DispatchTable<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for a node type.
    pub fn register<H>(&mut self, node_type: NodeType, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        if self.handlers.insert(node_type, Box::new(handler)).is_some() {
            log::debug!("Replaced handler for {}", node_type);
        }
        self
    }

    /// Register a closure. Spelled out separately so the closure's argument
    /// type is inferred.
    pub fn register_fn<F>(&mut self, node_type: NodeType, handler: F) -> &mut Self
    where
        F: Fn(HandlerParams<'_, T>) -> Result<ConversionContext<T>, HandlerError> + Send + Sync + 'static,
    {
        self.register(node_type, handler)
    }

    /// Register the same closure for several node types.
    pub fn register_many<F>(&mut self, node_types: &[NodeType], handler: F) -> &mut Self
    where
        F: Fn(HandlerParams<'_, T>) -> Result<ConversionContext<T>, HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
    {
        for &node_type in node_types {
            self.register(node_type, handler.clone());
        }
        self
    }

    pub fn get(&self, node_type: NodeType) -> Option<&dyn Handler<T>> {
        self.handlers.get(&node_type).map(|h| h.as_ref())
    }

    pub fn contains(&self, node_type: NodeType) -> bool {
        self.handlers.contains_key(&node_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered node types, sorted.
    pub fn node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }
}

impl<T> Default for DispatchTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
