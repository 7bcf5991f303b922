//! Triangle mesh produced by the conversion handlers.

use glam::{Mat4, Vec3};

/// Axis-aligned bounds of a set of points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Bounds containing nothing; the identity of [`union`](Self::union).
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::empty(), |bounds, &p| Self {
            min: bounds.min.min(p),
            max: bounds.max.max(p),
        })
    }

    pub fn union(&self, other: &Bounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }
}

/// Vertex positions plus triangle indices (every 3 indices form a triangle,
/// counter-clockwise when seen from the front).
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub bounds: Bounds,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Bounds::from_points(&positions);
        Self {
            positions,
            indices,
            bounds,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Axis-aligned box centered on the origin.
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        let positions = vec![
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        let indices = vec![
            4, 5, 6, 4, 6, 7, // front
            1, 0, 3, 1, 3, 2, // back
            3, 7, 6, 3, 6, 2, // top
            0, 1, 5, 0, 5, 4, // bottom
            0, 4, 7, 0, 7, 3, // left
            5, 1, 2, 5, 2, 6, // right
        ];
        Self::new(positions, indices)
    }

    /// Apply an affine transform to every position and refresh the bounds.
    pub fn transform(&mut self, matrix: &Mat4) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
        self.bounds = Bounds::from_points(&self.positions);
    }

    /// Reverse the winding of every triangle.
    pub fn flip_winding(&mut self) {
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    /// Append another mesh, offsetting its indices.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
        self.bounds = self.bounds.union(&other.bounds);
    }

    /// One unit normal per triangle, following its winding.
    pub fn face_normals(&self) -> Vec<Vec3> {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let p0 = self.positions[tri[0] as usize];
                let p1 = self.positions[tri[1] as usize];
                let p2 = self.positions[tri[2] as usize];
                (p1 - p0).cross(p2 - p0).normalize_or_zero()
            })
            .collect()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> FromIterator<&'a Mesh> for Mesh {
    fn from_iter<I: IntoIterator<Item = &'a Mesh>>(iter: I) -> Self {
        let mut combined = Mesh::empty();
        for mesh in iter {
            combined.append(mesh);
        }
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid() {
        let mesh = Mesh::cuboid(Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.bounds.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(mesh.bounds.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_cuboid_faces_point_outward() {
        let mesh = Mesh::cuboid(Vec3::ONE);
        for (i, normal) in mesh.face_normals().into_iter().enumerate() {
            let tri = &mesh.indices[i * 3..i * 3 + 3];
            let centroid = tri.iter().map(|&v| mesh.positions[v as usize]).sum::<Vec3>() / 3.0;
            assert!(normal.dot(centroid) > 0.0, "Triangle {} faces inward", i);
        }
    }

    #[test]
    fn test_transform_updates_bounds() {
        let mut mesh = Mesh::cuboid(Vec3::splat(2.0));
        mesh.transform(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(mesh.bounds.min, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(mesh.bounds.center(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_append_offsets_indices() {
        let a = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2]);
        let b = Mesh::new(vec![Vec3::Z, Vec3::X, Vec3::Y], vec![0, 1, 2]);
        let combined: Mesh = [&a, &b].into_iter().collect();
        assert_eq!(combined.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(combined.bounds.max, Vec3::ONE);
    }

    #[test]
    fn test_empty_bounds() {
        let bounds = Bounds::from_points(&[]);
        assert!(bounds.is_empty());
        assert_eq!(bounds.extent(), Vec3::ZERO);
        assert!(!Mesh::cuboid(Vec3::ONE).bounds.is_empty());
    }
}
