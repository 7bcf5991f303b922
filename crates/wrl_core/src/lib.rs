//! WRL Core - VRML scene parsing, validation and parallel dispatch.
//!
//! This crate provides:
//!
//! - **Parser**: a VRML 2.0 text buffer into a node arena ([`Document`])
//! - **Bindings**: `DEF` names resolved for `USE` references
//! - **Validation**: canonical node types, field schemas and defaults
//! - **Traversal**: dispatch of validated nodes to injected handlers, with
//!   sibling subtrees fanned out to a worker pool and merged in order
//!
//! What a node *means* is left to the handlers registered in a
//! [`DispatchTable`]. The crate never reads files and never prints.
//!
//! # Example
//!
//! ```ignore
//! use wrl_core::{process, BufferView, Config, ConversionContext, DispatchTable, NodeType};
//!
//! let mut dispatch = DispatchTable::new();
//! dispatch.register_fn(NodeType::Box, |mut params| {
//!     let size = params.view.get_vec3("size")?;
//!     params.context.push(size);
//!     Ok(params.context)
//! });
//!
//! let sizes = process(BufferView::from("Box { size 2 2 2 }"), &dispatch, &Config::default())?;
//! assert_eq!(sizes.len(), 1);
//! ```

pub mod binding;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod model;
pub mod parser;
pub mod schema;
pub mod traverse;
pub mod view;

// Re-export commonly used types
pub use binding::{BindingError, BindingTable};
pub use config::{Config, ConfigError};
pub use context::ConversionContext;
pub use dispatch::{DispatchTable, Handler};
pub use error::{
    BoxError, Error, ErrorKind, HandlerError, TraversalError, TraversalFailure, TraversalResult,
    ValidationError, ValidationResult,
};
pub use headers::{CanonicalHeaderTable, HeaderTableError, NodeType};
pub use model::{Document, Field, FieldKind, FieldValue, Node, NodeId, NodeRef};
pub use parser::{parse_buffer, parse_str, BufferView, ParseError, ParseResult};
pub use schema::{FieldShape, FieldSpec, NodeSchema};
pub use traverse::{traverse_roots, HandlerParams, Traversal};
pub use view::{validate, NodeView};

/// Parse a buffer and traverse it with the given handlers.
///
/// The header table is the builtin one extended with `config.synonyms`. On a
/// traversal failure the partial output of earlier roots is discarded; call
/// [`parse_buffer`] and [`traverse_roots`] directly to keep it.
pub fn process<T: Send>(
    buffer: BufferView<'_>,
    dispatch: &DispatchTable<T>,
    config: &Config,
) -> Result<ConversionContext<T>, Error> {
    config.check()?;
    let document = parse_buffer(buffer)?;
    let headers = config.header_table()?;
    traverse_roots(&document, &headers, dispatch, config).map_err(|failure| Error::Traversal(failure.error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_counts_boxes() {
        let mut dispatch = DispatchTable::new();
        dispatch.register_fn(NodeType::Box, |mut params| {
            params.context.push(params.view.offset());
            Ok(params.context)
        });

        let result = process(BufferView::from("Box { } Box { }"), &dispatch, &Config::sequential()).unwrap();
        assert_eq!(result.contributions(), &[0, 8]);
    }

    #[test]
    fn test_process_uses_config_synonyms() {
        let dispatch: DispatchTable<()> = DispatchTable::new();
        let text = BufferView::from("Cube { }");

        let err = process(text, &dispatch, &Config::sequential()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HeaderValidation);

        let config = Config::sequential().with_synonym("Cube", "Box");
        assert!(process(text, &dispatch, &config).unwrap().is_empty());
    }

    #[test]
    fn test_process_error_kinds() {
        let dispatch: DispatchTable<()> = DispatchTable::new();
        let err = process(BufferView::from("Box {"), &dispatch, &Config::sequential()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Grammar);

        let config = Config::sequential().with_synonym("Cube", "Teapot");
        let err = process(BufferView::from("Box { }"), &dispatch, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
