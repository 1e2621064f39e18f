//! Generic model vertex

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::backend::Color;

/// A vertex as imported from a model file
///
/// Every attribute is optional; which ones are populated is the same for all
/// vertices of a mesh by convention. GPU vertex types are produced from this
/// by a [`VertexMapping`](super::mapping::VertexMapping).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelVertex {
    pub position: Option<Vec3>,
    pub normal: Option<Vec3>,
    pub tangent: Option<Vec3>,
    pub bitangent: Option<Vec3>,
    pub colors: Vec<Color>,
    pub tex_coords: Vec<Vec2>,
    /// Four bone slots, packed as bytes
    pub bone_indices: Option<[u8; 4]>,
    pub bone_weights: Option<Vec4>,
}

impl ModelVertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_tangents(mut self, tangent: Vec3, bitangent: Vec3) -> Self {
        self.tangent = Some(tangent);
        self.bitangent = Some(bitangent);
        self
    }

    /// Append a UV channel
    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.tex_coords.push(uv);
        self
    }

    /// Append a color channel
    pub fn with_color(mut self, color: Color) -> Self {
        self.colors.push(color);
        self
    }

    pub fn with_bones(mut self, indices: [u8; 4], weights: Vec4) -> Self {
        self.bone_indices = Some(indices);
        self.bone_weights = Some(weights);
        self
    }

    /// First UV channel
    pub fn uv0(&self) -> Option<Vec2> {
        self.tex_coords.first().copied()
    }

    /// First color channel
    pub fn color0(&self) -> Option<Color> {
        self.colors.first().copied()
    }

    pub fn is_skinned(&self) -> bool {
        self.bone_indices.is_some() && self.bone_weights.is_some()
    }

    /// Transform by a world matrix: position as a point, directions renormalized
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let direction = |v: Vec3| matrix.transform_vector3(v).normalize_or_zero();
        Self {
            position: self.position.map(|p| matrix.transform_point3(p)),
            normal: self.normal.map(direction),
            tangent: self.tangent.map(direction),
            bitangent: self.bitangent.map(direction),
            ..self.clone()
        }
    }
}

/// Clamp and round floats into packed bone indices
pub fn pack_bone_indices(value: Vec4) -> [u8; 4] {
    let pack = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    [pack(value.x), pack(value.y), pack(value.z), pack(value.w)]
}

pub fn unpack_bone_indices(indices: [u8; 4]) -> Vec4 {
    Vec4::new(
        indices[0] as f32,
        indices[1] as f32,
        indices[2] as f32,
        indices[3] as f32,
    )
}
