//! WRL Mesh - VRML scenes to triangle meshes.
//!
//! A handler set for [`wrl_core`]: `Shape` geometry (`Box`,
//! `IndexedFaceSet`) becomes a [`Mesh`], grouping nodes collect their
//! children and `Transform` matrices are baked into the positions.
//!
//! # Example
//!
//! ```ignore
//! use wrl_core::{BufferView, Config};
//!
//! let meshes = wrl_mesh::convert(BufferView::from(text.as_str()), &Config::default())?;
//! let combined: wrl_mesh::Mesh = meshes.iter().collect();
//! println!("{} triangles", combined.triangle_count());
//! ```

pub mod error;
pub mod handlers;
pub mod mesh;

pub use error::MeshError;
pub use handlers::{mesh_dispatch_table, transform_matrix, triangulate};
pub use mesh::{Bounds, Mesh};

use wrl_core::{BufferView, Config};

/// Parse a VRML buffer and convert it to one mesh per geometry instance, in
/// document order.
pub fn convert(buffer: BufferView<'_>, config: &Config) -> Result<Vec<Mesh>, wrl_core::Error> {
    let meshes = wrl_core::process(buffer, &mesh_dispatch_table(), config)?;
    Ok(meshes.into_contributions())
}
