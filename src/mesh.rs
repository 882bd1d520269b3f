use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Floats per vertex: `position.xyz` followed by `normal.xyz`.
pub const VERTEX_STRIDE: usize = 6;

/// GPU ready triangle list with interleaved positions and normals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis aligned box between `min` and `max` with flat face normals.
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let mut mesh = Self::new();
        for face in Face::ALL {
            mesh.push_box_face(min, max, face);
        }
        mesh
    }

    /// Unit cube centered on the origin.
    pub fn cube() -> Self {
        Self::cuboid(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends a quad. Corners are listed counter-clockwise as seen from the
    /// side `normal` points to.
    pub fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        let base = self.vertex_count() as u32;
        for corner in corners {
            self.vertices.extend_from_slice(&corner.to_array());
            self.vertices.extend_from_slice(&normal.to_array());
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Appends one face of the box spanned by `min` and `max`.
    pub fn push_box_face(&mut self, min: Vec3, max: Vec3, face: Face) {
        let (a, b) = (min, max);
        let corners = match face {
            Face::Front => [
                Vec3::new(a.x, a.y, b.z),
                Vec3::new(b.x, a.y, b.z),
                Vec3::new(b.x, b.y, b.z),
                Vec3::new(a.x, b.y, b.z),
            ],
            Face::Back => [
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(a.x, b.y, a.z),
                Vec3::new(b.x, b.y, a.z),
                Vec3::new(b.x, a.y, a.z),
            ],
            Face::Left => [
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(a.x, a.y, b.z),
                Vec3::new(a.x, b.y, b.z),
                Vec3::new(a.x, b.y, a.z),
            ],
            Face::Right => [
                Vec3::new(b.x, a.y, a.z),
                Vec3::new(b.x, b.y, a.z),
                Vec3::new(b.x, b.y, b.z),
                Vec3::new(b.x, a.y, b.z),
            ],
            Face::Bottom => [
                Vec3::new(a.x, a.y, a.z),
                Vec3::new(b.x, a.y, a.z),
                Vec3::new(b.x, a.y, b.z),
                Vec3::new(a.x, a.y, b.z),
            ],
            Face::Top => [
                Vec3::new(a.x, b.y, a.z),
                Vec3::new(a.x, b.y, b.z),
                Vec3::new(b.x, b.y, b.z),
                Vec3::new(b.x, b.y, a.z),
            ],
        };
        self.push_quad(corners, face.normal());
    }

    /// Smallest box containing every vertex, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut positions = self
            .vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|v| Vec3::new(v[0], v[1], v[2]));
        let first = positions.next()?;
        Some(positions.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }
}

/// Faces of an axis aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Front,
    Back,
    Left,
    Right,
    Bottom,
    Top,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Back,
        Face::Left,
        Face::Right,
        Face::Bottom,
        Face::Top,
    ];

    pub fn normal(self) -> Vec3 {
        match self {
            Face::Front => Vec3::Z,
            Face::Back => Vec3::NEG_Z,
            Face::Left => Vec3::NEG_X,
            Face::Right => Vec3::X,
            Face::Bottom => Vec3::NEG_Y,
            Face::Top => Vec3::Y,
        }
    }
}
