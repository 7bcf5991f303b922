//! Errors raised while building meshes from validated nodes.

use glam::Vec3;
use thiserror::Error;

/// Geometry that validates but cannot be turned into a mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("Box size must be positive on every axis, got {size}")]
    InvalidBoxSize { size: Vec3 },

    #[error("Face {face} has {count} vertices, at least 3 are needed")]
    DegenerateFace { face: usize, count: usize },

    #[error("Coordinate index {index} is out of range for {count} points")]
    IndexOutOfRange { index: i32, count: usize },

    #[error("coordIndex is set but the face set has no coordinates")]
    MissingCoordinates,
}
