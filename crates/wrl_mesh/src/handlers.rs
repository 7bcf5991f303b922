//! Dispatch handlers turning validated nodes into meshes.
//!
//! Geometry nodes only produce a mesh when they sit inside a `Shape`; a
//! geometry node declared on its own (for example a root-level `DEF` that is
//! instanced elsewhere) contributes nothing. Grouping nodes pass their
//! children's meshes through, and `Transform` bakes its matrix into them.
//! Node types without a handler here are skipped by the engine.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3, Vec4};
use wrl_core::{ConversionContext, DispatchTable, HandlerError, HandlerParams, NodeType, NodeView, ValidationResult};

use crate::error::MeshError;
use crate::mesh::Mesh;

type MeshResult = Result<ConversionContext<Mesh>, HandlerError>;

/// Handlers for every node type this crate converts.
pub fn mesh_dispatch_table() -> DispatchTable<Mesh> {
    let mut table = DispatchTable::new();
    table
        .register_fn(NodeType::Box, box_mesh)
        .register_fn(NodeType::IndexedFaceSet, indexed_face_set)
        .register_fn(NodeType::Shape, shape)
        .register_fn(NodeType::Transform, transform)
        .register_fn(NodeType::Switch, switch)
        .register_fn(NodeType::Lod, lod)
        .register_many(
            &[NodeType::Group, NodeType::Anchor, NodeType::Billboard, NodeType::Collision],
            group,
        );
    table
}

fn inside_shape(params: &HandlerParams<'_, Mesh>) -> bool {
    let inside = params.has_ancestor(NodeType::Shape);
    if !inside {
        log::debug!(
            "{} at offset {} is not inside a Shape, skipping",
            params.view.node_type(),
            params.view.offset()
        );
    }
    inside
}

pub fn box_mesh(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    if !inside_shape(&params) {
        return Ok(params.context);
    }
    let size = params.view.get_vec3("size")?;
    if size.cmple(Vec3::ZERO).any() {
        return Err(HandlerError::domain(MeshError::InvalidBoxSize { size }));
    }
    params.context.push(Mesh::cuboid(size));
    Ok(params.context)
}

pub fn indexed_face_set(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    if !inside_shape(&params) {
        return Ok(params.context);
    }
    let coord_index = params.view.get_int32_array("coordIndex")?;
    if coord_index.is_empty() {
        log::warn!(
            "IndexedFaceSet at offset {} has no coordIndex, nothing to convert",
            params.view.offset()
        );
        return Ok(params.context);
    }

    let coord = params.view.extract_child("coord")?;
    let points: &[Vec3] = match &coord {
        Some(coord) => coord.get_vec3_array("point")?,
        None => &[],
    };
    let mut mesh = triangulate(coord_index, points).map_err(HandlerError::domain)?;
    if !params.view.get_bool("ccw")? {
        mesh.flip_winding();
    }

    log::debug!(
        "IndexedFaceSet at offset {}: {} vertices, {} triangles",
        params.view.offset(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    params.context.push(mesh);
    Ok(params.context)
}

/// Fan-triangulate `-1` separated polygons. Only the points a face uses end
/// up in the mesh, in order of first use.
pub fn triangulate(coord_index: &[i32], points: &[Vec3]) -> Result<Mesh, MeshError> {
    if points.is_empty() {
        return Err(MeshError::MissingCoordinates);
    }

    let mut remap: HashMap<i32, u32> = HashMap::new();
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for (face, polygon) in coord_index.split(|&i| i == -1).enumerate() {
        if polygon.is_empty() {
            continue;
        }
        if polygon.len() < 3 {
            return Err(MeshError::DegenerateFace {
                face,
                count: polygon.len(),
            });
        }

        let mut corners = Vec::with_capacity(polygon.len());
        for &index in polygon {
            let vertex = match remap.get(&index) {
                Some(&vertex) => vertex,
                None => {
                    let point = usize::try_from(index)
                        .ok()
                        .and_then(|i| points.get(i))
                        .ok_or(MeshError::IndexOutOfRange {
                            index,
                            count: points.len(),
                        })?;
                    let vertex = positions.len() as u32;
                    positions.push(*point);
                    remap.insert(index, vertex);
                    vertex
                }
            };
            corners.push(vertex);
        }

        for i in 1..corners.len() - 1 {
            indices.extend([corners[0], corners[i], corners[i + 1]]);
        }
    }

    Ok(Mesh::new(positions, indices))
}

pub fn shape(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    let geometry = params.traverse_child("geometry")?;
    params.context.merge(geometry);
    Ok(params.context)
}

pub fn group(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    let children = params.traverse_children("children")?;
    params.context.merge(children);
    Ok(params.context)
}

pub fn transform(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    let matrix = transform_matrix(&params.view)?;
    let mirrored = matrix.determinant() < 0.0;

    let mut children = params.traverse_children("children")?;
    for mesh in children.contributions_mut() {
        mesh.transform(&matrix);
        if mirrored {
            mesh.flip_winding();
        }
    }
    params.context.merge(children);
    Ok(params.context)
}

/// Only the child selected by `whichChoice`; out of range selects nothing.
pub fn switch(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    let which = params.view.get_int32("whichChoice")?;
    let choices = params.view.child_refs("choice")?;
    let chosen = match usize::try_from(which).ok().and_then(|i| choices.get(i)) {
        Some(choice) => params.traverse_ref(choice)?,
        None => ConversionContext::new(),
    };
    params.context.merge(chosen);
    Ok(params.context)
}

/// The most detailed level only.
pub fn lod(mut params: HandlerParams<'_, Mesh>) -> MeshResult {
    let levels = params.view.child_refs("level")?;
    let finest = match levels.first() {
        Some(level) => params.traverse_ref(level)?,
        None => ConversionContext::new(),
    };
    params.context.merge(finest);
    Ok(params.context)
}

/// Local matrix of a `Transform` node: `T * C * R * SR * S * -SR * -C`.
pub fn transform_matrix(view: &NodeView<'_>) -> ValidationResult<Mat4> {
    let center = view.get_vec3("center")?;
    let rotation = axis_angle(view.get_vec4("rotation")?);
    let scale = view.get_vec3("scale")?;
    let scale_orientation = axis_angle(view.get_vec4("scaleOrientation")?);
    let translation = view.get_vec3("translation")?;

    Ok(Mat4::from_translation(translation + center)
        * Mat4::from_quat(rotation)
        * Mat4::from_quat(scale_orientation)
        * Mat4::from_scale(scale)
        * Mat4::from_quat(scale_orientation.inverse())
        * Mat4::from_translation(-center))
}

/// VRML rotation (axis xyz, angle w in radians) as a quaternion.
fn axis_angle(rotation: Vec4) -> Quat {
    let axis = rotation.truncate();
    if rotation.w == 0.0 || axis.length_squared() == 0.0 {
        Quat::IDENTITY
    } else {
        Quat::from_axis_angle(axis.normalize(), rotation.w)
    }
}
