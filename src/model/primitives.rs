//! Procedural meshes
//!
//! The unit sphere is the light volume of point lights; both shapes are also
//! handy fixtures.

use std::f32::consts::PI;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use super::animation::AnimationCollection;
use super::mapping::VertexMappingRegistry;
use super::mesh::ModelMesh;
use super::model::Model;
use super::vertex::ModelVertex;

/// UV sphere of radius 1 centered at the origin
pub fn sphere_mesh(registry: Rc<VertexMappingRegistry>, segments: u32, rings: u32) -> ModelMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let segment_angle = 2.0 * PI / segments as f32;
    let ring_angle = PI / rings as f32;

    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for ring in 0..=rings {
        let phi = ring as f32 * ring_angle;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for segment in 0..=segments {
            let theta = segment as f32 * segment_angle;
            let position = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
            let normal = position.normalize_or_zero();
            let tangent = Vec3::new(-theta.sin(), 0.0, theta.cos());
            let uv = Vec2::new(
                segment as f32 / segments as f32,
                ring as f32 / rings as f32,
            );

            vertices.push(
                ModelVertex::new(position)
                    .with_normal(normal)
                    .with_tangents(tangent, normal.cross(tangent))
                    .with_uv(uv),
            );
        }
    }

    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            indices.extend_from_slice(&[current, next, current + 1, current + 1, next, next + 1]);
        }
    }

    ModelMesh::new(registry, None, vertices, indices)
}

/// Cube with unit half-extent, four vertices per face
pub fn cube_mesh(registry: Rc<VertexMappingRegistry>) -> ModelMesh {
    // (normal, up) per face; the third axis completes the basis
    let faces = [
        (Vec3::Z, Vec3::Y),
        (-Vec3::Z, Vec3::Y),
        (Vec3::X, Vec3::Y),
        (-Vec3::X, Vec3::Y),
        (Vec3::Y, -Vec3::Z),
        (-Vec3::Y, Vec3::Z),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, up)) in faces.into_iter().enumerate() {
        let right = up.cross(normal);
        let corners = [
            (-1.0, -1.0, Vec2::new(0.0, 1.0)),
            (1.0, -1.0, Vec2::new(1.0, 1.0)),
            (1.0, 1.0, Vec2::new(1.0, 0.0)),
            (-1.0, 1.0, Vec2::new(0.0, 0.0)),
        ];
        for (u, v, uv) in corners {
            vertices.push(
                ModelVertex::new(normal + right * u + up * v)
                    .with_normal(normal)
                    .with_tangents(right, up)
                    .with_uv(uv),
            );
        }

        let base = face as u32 * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    ModelMesh::new(registry, None, vertices, indices)
}

/// Single-mesh model of a unit sphere
pub fn sphere_model(name: &str, registry: Rc<VertexMappingRegistry>) -> Model {
    Model::new(
        name,
        AnimationCollection::default(),
        vec![sphere_mesh(registry, 24, 16)],
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Rc<VertexMappingRegistry> {
        Rc::new(VertexMappingRegistry::with_defaults())
    }

    #[test]
    fn sphere_vertices_lie_on_unit_sphere() {
        let sphere = sphere_mesh(registry(), 8, 4);
        assert_eq!(sphere.vertices().len(), 9 * 5);
        assert_eq!(sphere.indices().len(), 8 * 4 * 6);
        for vertex in sphere.vertices() {
            assert!((vertex.position.unwrap().length() - 1.0).abs() < 1e-5);
        }
        let highest = sphere.indices().iter().max().copied().unwrap();
        assert!((highest as usize) < sphere.vertices().len());
    }

    #[test]
    fn cube_faces_point_outward() {
        let cube = cube_mesh(registry());
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.indices().len(), 36);
        for vertex in cube.vertices() {
            let position = vertex.position.unwrap();
            let normal = vertex.normal.unwrap();
            assert!((position.dot(normal) - 1.0).abs() < 1e-5);
            assert_eq!(position.abs().max_element(), 1.0);
        }
    }
}
