//! Traversal and dispatch engine.
//!
//! Each visited node goes through the same steps: resolve (for `USE`),
//! check for cycles and depth, validate, look up its handler, run it and
//! hand the resulting context to the parent. Handlers recurse into their
//! children through [`HandlerParams`], which routes back into the engine.
//!
//! Before a root is dispatched its whole subtree is validated, so a bad
//! header or a dangling `USE` is reported even below nodes that have no
//! handler or in fields a handler never visits. With
//! [`Config::ignore_unknown_node`] set, nodes with unknown headers are
//! skipped along with everything below them.
//!
//! # Fan-out
//!
//! When a set of sibling subtrees is large enough (see
//! [`Config::parallel_threshold`]) and a worker pool is configured, the
//! siblings are traversed on the pool. Results land in per-sibling slots and
//! are merged by index, so the output is identical to a sequential run.
//!
//! # Failure policy
//!
//! Sequential siblings stop at the first failure. Parallel siblings all run
//! to completion; the first failure in declaration order is reported and
//! everything else is dropped. At the root level the contributions of roots
//! preceding the failing root are returned as the partial result of
//! [`TraversalFailure`].

use std::time::Instant;

use rayon::prelude::*;

use crate::binding::BindingTable;
use crate::config::Config;
use crate::context::ConversionContext;
use crate::dispatch::DispatchTable;
use crate::error::{HandlerError, TraversalError, TraversalFailure, TraversalResult, ValidationError, ValidationResult};
use crate::headers::{CanonicalHeaderTable, NodeType};
use crate::model::{Document, FieldValue, NodeId, NodeRef};
use crate::view::{validate, NodeView};

/// Everything a handler gets for one node.
pub struct HandlerParams<'a, T> {
    /// The validated node being handled
    pub view: NodeView<'a>,

    /// Empty context for this node's contributions
    pub context: ConversionContext<T>,

    traversal: &'a Traversal<'a, T>,

    /// Path from the root to this node, inclusive
    ancestry: Vec<NodeId>,
}

impl<'a, T: Send> HandlerParams<'a, T> {
    pub fn bindings(&self) -> &'a BindingTable {
        self.traversal.document.bindings()
    }

    pub fn dispatch(&self) -> &'a DispatchTable<T> {
        self.traversal.dispatch
    }

    pub fn config(&self) -> &'a Config {
        self.traversal.config
    }

    /// Nesting level of this node; roots are at depth 0.
    pub fn depth(&self) -> usize {
        self.ancestry.len() - 1
    }

    /// Node types on the path from the root down to this node's parent,
    /// outermost first.
    pub fn ancestor_types(&self) -> impl Iterator<Item = NodeType> + '_ {
        let document = self.traversal.document;
        let headers = self.traversal.headers;
        self.ancestry[..self.ancestry.len() - 1]
            .iter()
            .filter_map(move |&id| headers.canonicalize(&document[id].header))
    }

    pub fn has_ancestor(&self, node_type: NodeType) -> bool {
        self.ancestor_types().any(|ty| ty == node_type)
    }

    /// Dispatch an already validated child view.
    pub fn traverse(&self, view: NodeView<'a>) -> TraversalResult<ConversionContext<T>> {
        self.traversal.visit_view(view, &self.ancestry)
    }

    /// Resolve, validate and dispatch one node-array element.
    pub fn traverse_ref(&self, node_ref: &NodeRef) -> TraversalResult<ConversionContext<T>> {
        self.traversal.visit_ref(node_ref, &self.ancestry)
    }

    /// Traverse the node in a single-node field. An unset field yields an
    /// empty context.
    pub fn traverse_child(&self, field: &str) -> TraversalResult<ConversionContext<T>> {
        match self.view.extract_child(field) {
            Ok(Some(child)) => self.traverse(child),
            Ok(None) => Ok(ConversionContext::new()),
            Err(error) => self.traversal.skip_unknown(error),
        }
    }

    /// Traverse every element of a node-array field and merge the results in
    /// declaration order, fanning out to the worker pool when worthwhile.
    pub fn traverse_children(&self, field: &str) -> TraversalResult<ConversionContext<T>> {
        let refs = self.view.child_refs(field)?;
        self.traversal.visit_all(refs, &self.ancestry)
    }
}

/// One traversal of a parsed document.
///
/// The document, header table, dispatch table and config are borrowed
/// read-only and shared by every worker.
pub struct Traversal<'a, T> {
    document: &'a Document,
    headers: &'a CanonicalHeaderTable,
    dispatch: &'a DispatchTable<T>,
    config: &'a Config,
    pool: Option<rayon::ThreadPool>,
    subtree_sizes: Vec<usize>,
}

impl<'a, T: Send> Traversal<'a, T> {
    pub fn new(
        document: &'a Document,
        headers: &'a CanonicalHeaderTable,
        dispatch: &'a DispatchTable<T>,
        config: &'a Config,
    ) -> TraversalResult<Self> {
        let pool = if config.parallelism == 1 {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.parallelism)
                .thread_name(|i| format!("wrl-traverse-{}", i))
                .build()?;
            log::debug!("Traversal pool with {} threads", pool.current_num_threads());
            Some(pool)
        };

        Ok(Self {
            document,
            headers,
            dispatch,
            config,
            pool,
            subtree_sizes: subtree_sizes(document),
        })
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Traverse every root and merge the results in declaration order.
    pub fn traverse_roots(&self) -> Result<ConversionContext<T>, TraversalFailure<T>> {
        let started = Instant::now();
        let roots: Vec<NodeRef> = self.document.roots().iter().map(|&id| NodeRef::Node(id)).collect();

        let (merged, failure) = self.run(&roots, &[]);
        match failure {
            None => {
                log::info!(
                    "Traversed {} roots into {} contributions in {:.2?}",
                    roots.len(),
                    merged.len(),
                    started.elapsed()
                );
                Ok(merged)
            }
            Some(error) => {
                log::warn!("Traversal failed after {} contributions: {}", merged.len(), error);
                Err(TraversalFailure {
                    error,
                    partial: merged,
                })
            }
        }
    }

    fn visit_all(&self, refs: &[NodeRef], ancestry: &[NodeId]) -> TraversalResult<ConversionContext<T>> {
        match self.run(refs, ancestry) {
            (merged, None) => Ok(merged),
            (_, Some(error)) => Err(error),
        }
    }

    /// Visit siblings, merging in order until the first failure.
    ///
    /// Returns what was merged before the failure alongside the failure.
    fn run(&self, refs: &[NodeRef], ancestry: &[NodeId]) -> (ConversionContext<T>, Option<TraversalError>) {
        let mut merged = ConversionContext::new();

        if let Some(pool) = self.fan_out_pool(refs) {
            let results: Vec<TraversalResult<ConversionContext<T>>> = pool.install(|| {
                refs.par_iter()
                    .map(|node_ref| self.visit_ref(node_ref, ancestry))
                    .collect()
            });
            for result in results {
                match result {
                    Ok(context) => merged.merge(context),
                    Err(error) => return (merged, Some(error)),
                }
            }
            return (merged, None);
        }

        for node_ref in refs {
            match self.visit_ref(node_ref, ancestry) {
                Ok(context) => merged.merge(context),
                Err(error) => return (merged, Some(error)),
            }
        }
        (merged, None)
    }

    fn fan_out_pool(&self, refs: &[NodeRef]) -> Option<&rayon::ThreadPool> {
        let pool = self.pool.as_ref()?;
        if refs.len() < 2 {
            return None;
        }
        let work: usize = refs
            .iter()
            .map(|node_ref| match node_ref {
                NodeRef::Node(id) => self.subtree_sizes[*id],
                NodeRef::Use(_) => 1,
            })
            .sum();
        (work >= self.config.parallel_threshold).then_some(pool)
    }

    fn visit_ref(&self, node_ref: &NodeRef, ancestry: &[NodeId]) -> TraversalResult<ConversionContext<T>> {
        let id = self.document.resolve(node_ref).map_err(|e| TraversalError::Validation(e.into()))?;
        self.enter(id, ancestry)?;
        if ancestry.is_empty() {
            self.validate_subtree(id)?;
        }
        match validate(self.document, self.headers, id) {
            Ok(view) => self.dispatch_view(view, ancestry),
            Err(error) => self.skip_unknown(error),
        }
    }

    /// Validate every node owned by the subtree at `root`, in document order.
    fn validate_subtree(&self, root: NodeId) -> ValidationResult<()> {
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let node = &self.document[id];
            if self.config.ignore_unknown_node && self.headers.canonicalize(&node.header).is_none() {
                continue;
            }
            validate(self.document, self.headers, id)?;
            for field in node.fields.iter().rev() {
                match &field.value {
                    FieldValue::Node(child) => pending.push(*child),
                    FieldValue::NodeArray(items) => {
                        pending.extend(items.iter().rev().filter_map(|item| match item {
                            NodeRef::Node(child) => Some(*child),
                            NodeRef::Use(_) => None,
                        }))
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// An unknown header becomes an empty context when the config says so.
    fn skip_unknown(&self, error: ValidationError) -> TraversalResult<ConversionContext<T>> {
        match error {
            ValidationError::UnknownHeader { header, offset } if self.config.ignore_unknown_node => {
                log::info!("Ignoring unknown node '{}' at offset {}", header, offset);
                Ok(ConversionContext::new())
            }
            error => Err(error.into()),
        }
    }

    fn visit_view(&self, view: NodeView<'a>, ancestry: &[NodeId]) -> TraversalResult<ConversionContext<T>> {
        self.enter(view.id(), ancestry)?;
        self.dispatch_view(view, ancestry)
    }

    /// Reject a node already on its own ancestor path, or one too deep.
    fn enter(&self, id: NodeId, ancestry: &[NodeId]) -> TraversalResult<()> {
        let node = &self.document[id];
        if ancestry.contains(&id) {
            return Err(TraversalError::CyclicReference {
                header: node.header.clone(),
                binding: node.binding.clone(),
                offset: node.offset,
            });
        }
        if ancestry.len() >= self.config.max_depth {
            return Err(TraversalError::DepthExceeded {
                limit: self.config.max_depth,
                offset: node.offset,
            });
        }
        Ok(())
    }

    fn dispatch_view(&self, view: NodeView<'a>, ancestry: &[NodeId]) -> TraversalResult<ConversionContext<T>> {
        let node_type = view.node_type();
        let offset = view.offset();
        let Some(handler) = self.dispatch.get(node_type) else {
            log::debug!("No handler for {} at offset {}, skipping", node_type, offset);
            return Ok(ConversionContext::new());
        };

        let mut path = Vec::with_capacity(ancestry.len() + 1);
        path.extend_from_slice(ancestry);
        path.push(view.id());

        let params = HandlerParams {
            view,
            context: ConversionContext::new(),
            traversal: self,
            ancestry: path,
        };
        handler.handle(params).map_err(|err| match err {
            HandlerError::Traversal(inner) => *inner,
            HandlerError::Validation(inner) => TraversalError::Validation(inner),
            HandlerError::Domain(source) => TraversalError::Handler {
                node_type,
                offset,
                source,
            },
        })
    }
}

/// Owned node count of every subtree, references counted as one.
///
/// Children always have larger ids than their parent, so a reverse sweep
/// sees every child before its parent.
fn subtree_sizes(document: &Document) -> Vec<usize> {
    let nodes = document.nodes();
    let mut sizes = vec![1; nodes.len()];
    for id in (0..nodes.len()).rev() {
        let mut size = 1;
        for field in &nodes[id].fields {
            match &field.value {
                FieldValue::Node(child) => size += sizes[*child],
                FieldValue::NodeArray(items) => {
                    for item in items {
                        size += match item {
                            NodeRef::Node(child) => sizes[*child],
                            NodeRef::Use(_) => 1,
                        };
                    }
                }
                _ => {}
            }
        }
        sizes[id] = size;
    }
    sizes
}

/// Traverse every root of a document with the given handlers.
///
/// On failure the error comes with the merged output of the roots that
/// precede the failing root.
pub fn traverse_roots<T: Send>(
    document: &Document,
    headers: &CanonicalHeaderTable,
    dispatch: &DispatchTable<T>,
    config: &Config,
) -> Result<ConversionContext<T>, TraversalFailure<T>> {
    let traversal = Traversal::new(document, headers, dispatch, config).map_err(|error| TraversalFailure {
        error,
        partial: ConversionContext::new(),
    })?;
    traversal.traverse_roots()
}
