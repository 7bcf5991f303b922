//! Error types shared by the validator, the traversal engine and handlers.

use std::fmt;

use thiserror::Error;

use crate::binding::BindingError;
use crate::config::ConfigError;
use crate::context::ConversionContext;
use crate::headers::{HeaderTableError, NodeType};
use crate::model::WrongKindError;
use crate::parser::ParseError;

/// Boxed error produced by a handler's own domain logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of every error the crate reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Grammar,
    BindingResolution,
    HeaderValidation,
    FieldValidation,
    Handler,
    CyclicReference,
    DepthLimit,
    Configuration,
}

/// A node failed canonicalization or field validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Unknown node header '{header}' at offset {offset}")]
    UnknownHeader { header: String, offset: usize },

    #[error("Duplicate field '{field}' in {header} node at offset {offset}")]
    DuplicateField {
        header: String,
        field: String,
        offset: usize,
    },

    #[error("Field '{field}' is not valid for {node_type} (node at offset {offset})")]
    InvalidField {
        node_type: NodeType,
        field: String,
        offset: usize,
    },

    #[error("Field '{field}' of {node_type} at offset {offset}: {source}")]
    WrongKind {
        node_type: NodeType,
        field: String,
        offset: usize,
        #[source]
        source: WrongKindError,
    },

    #[error("Field '{field}' of {node_type} at offset {offset}: '{value}' is not one of [{allowed}]")]
    InvalidStringValue {
        node_type: NodeType,
        field: String,
        offset: usize,
        value: String,
        allowed: String,
    },

    #[error("{found} node is not allowed in field '{field}' of {node_type} (node at offset {offset})")]
    InvalidNodeForField {
        node_type: NodeType,
        field: String,
        offset: usize,
        found: NodeType,
    },

    #[error("Field '{field}' of {node_type} at offset {offset} has no value and no default")]
    FieldNotFound {
        node_type: NodeType,
        field: String,
        offset: usize,
    },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Binding(_) => ErrorKind::BindingResolution,
            ValidationError::UnknownHeader { .. } => ErrorKind::HeaderValidation,
            _ => ErrorKind::FieldValidation,
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A subtree was rejected during traversal.
#[derive(Error, Debug)]
pub enum TraversalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Handler for {node_type} at offset {offset} failed: {source}")]
    Handler {
        node_type: NodeType,
        offset: usize,
        #[source]
        source: BoxError,
    },

    #[error("{header} node at offset {offset} is reached again from inside its own subtree")]
    CyclicReference {
        header: String,
        binding: Option<String>,
        offset: usize,
    },

    #[error("Traversal deeper than {limit} levels at offset {offset}")]
    DepthExceeded { limit: usize, offset: usize },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl TraversalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraversalError::Validation(err) => err.kind(),
            TraversalError::Handler { .. } => ErrorKind::Handler,
            TraversalError::CyclicReference { .. } => ErrorKind::CyclicReference,
            TraversalError::DepthExceeded { .. } => ErrorKind::DepthLimit,
            TraversalError::WorkerPool(_) => ErrorKind::Configuration,
        }
    }

    /// Source offset of the node the error is attributed to.
    pub fn offset(&self) -> Option<usize> {
        match self {
            TraversalError::Validation(err) => match err {
                ValidationError::Binding(_) => None,
                ValidationError::UnknownHeader { offset, .. }
                | ValidationError::DuplicateField { offset, .. }
                | ValidationError::InvalidField { offset, .. }
                | ValidationError::WrongKind { offset, .. }
                | ValidationError::InvalidStringValue { offset, .. }
                | ValidationError::InvalidNodeForField { offset, .. }
                | ValidationError::FieldNotFound { offset, .. } => Some(*offset),
            },
            TraversalError::Handler { offset, .. }
            | TraversalError::CyclicReference { offset, .. }
            | TraversalError::DepthExceeded { offset, .. } => Some(*offset),
            TraversalError::WorkerPool(_) => None,
        }
    }
}

/// Result type for traversal operations.
pub type TraversalResult<T> = Result<T, TraversalError>;

/// What a handler may fail with.
///
/// Errors from nested traversal pass through the engine unchanged, so the
/// caller sees the failure of the innermost rejected subtree.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Traversal(Box<TraversalError>),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Domain(#[source] BoxError),
}

impl HandlerError {
    /// Wrap a collaborator-defined error.
    pub fn domain(err: impl Into<BoxError>) -> Self {
        HandlerError::Domain(err.into())
    }
}

impl From<TraversalError> for HandlerError {
    fn from(err: TraversalError) -> Self {
        HandlerError::Traversal(Box::new(err))
    }
}

impl From<BindingError> for HandlerError {
    fn from(err: BindingError) -> Self {
        HandlerError::Validation(err.into())
    }
}

/// Traversal of the roots failed; carries what the earlier roots produced.
///
/// `partial` holds the merged contributions of every root that precedes the
/// failing root in declaration order. Nothing from the failing root or the
/// roots after it is kept.
#[derive(Debug)]
pub struct TraversalFailure<T> {
    pub error: TraversalError,
    pub partial: ConversionContext<T>,
}

impl<T> TraversalFailure<T> {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl<T> fmt::Display for TraversalFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} contributions from earlier roots kept)",
            self.error,
            self.partial.len()
        )
    }
}

impl<T: fmt::Debug> std::error::Error for TraversalFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Any failure of the one-call [`process`](crate::process) pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Headers(#[from] HeaderTableError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Traversal(#[from] TraversalError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Grammar,
            Error::Headers(_) | Error::Config(_) => ErrorKind::Configuration,
            Error::Traversal(err) => err.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let missing: ValidationError = BindingError {
            name: "Missing".into(),
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::BindingResolution);

        let header = ValidationError::UnknownHeader {
            header: "Teapot".into(),
            offset: 4,
        };
        assert_eq!(header.kind(), ErrorKind::HeaderValidation);

        let traversal = TraversalError::from(header);
        assert_eq!(traversal.kind(), ErrorKind::HeaderValidation);
        assert_eq!(traversal.offset(), Some(4));
        assert_eq!(traversal.to_string(), "Unknown node header 'Teapot' at offset 4");
    }

    #[test]
    fn test_handler_error_passes_traversal_through() {
        let inner = TraversalError::DepthExceeded { limit: 8, offset: 12 };
        let err: HandlerError = inner.into();
        match err {
            HandlerError::Traversal(inner) => assert_eq!(inner.kind(), ErrorKind::DepthLimit),
            other => panic!("Expected Traversal, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_display_mentions_partial() {
        let failure: TraversalFailure<u32> = TraversalFailure {
            error: TraversalError::DepthExceeded { limit: 2, offset: 0 },
            partial: ConversionContext::from_iter([1, 2]),
        };
        assert_eq!(failure.kind(), ErrorKind::DepthLimit);
        assert!(failure.to_string().contains("2 contributions"));
    }
}
