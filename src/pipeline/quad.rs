//! Screen-space quads for full-screen passes

use glam::{Vec2, Vec3};

use crate::backend::{GraphicsDevice, PrimitiveType, VertexLayout};
use crate::error::RenderResult;
use crate::model::mapping::{GpuVertexKind, VertexPositionTexture};

/// Draws a textured quad between two corners in normalized device coordinates
///
/// The caller applies the effect pass first.
pub trait QuadRenderer {
    fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        top_left: Vec2,
        bottom_right: Vec2,
    ) -> RenderResult<()>;
}

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Quad renderer that rebuilds its vertices only when the corners change
#[derive(Debug)]
pub struct DefaultQuadRenderer {
    layout: VertexLayout,
    corners: Option<(Vec2, Vec2)>,
    vertices: [VertexPositionTexture; 4],
}

impl Default for DefaultQuadRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultQuadRenderer {
    pub fn new() -> Self {
        Self {
            layout: GpuVertexKind::PositionTexture.layout(),
            corners: None,
            vertices: [VertexPositionTexture {
                position: Vec3::ZERO,
                uv: Vec2::ZERO,
            }; 4],
        }
    }

    pub fn vertices(&self) -> &[VertexPositionTexture; 4] {
        &self.vertices
    }

    fn update(&mut self, v1: Vec2, v2: Vec2) {
        if self.corners == Some((v1, v2)) {
            return;
        }
        let vertex = |x: f32, y: f32, u: f32, v: f32| VertexPositionTexture {
            position: Vec3::new(x, y, 0.0),
            uv: Vec2::new(u, v),
        };
        self.vertices = [
            vertex(v2.x, v1.y, 1.0, 1.0),
            vertex(v1.x, v1.y, 0.0, 1.0),
            vertex(v1.x, v2.y, 0.0, 0.0),
            vertex(v2.x, v2.y, 1.0, 0.0),
        ];
        self.corners = Some((v1, v2));
    }
}

impl QuadRenderer for DefaultQuadRenderer {
    fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        top_left: Vec2,
        bottom_right: Vec2,
    ) -> RenderResult<()> {
        self.update(top_left, bottom_right);
        device.draw_user_indexed(
            PrimitiveType::TriangleList,
            &self.layout,
            bytemuck::cast_slice(&self.vertices),
            &QUAD_INDICES,
            2,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCommand, RecordingDevice};

    #[test]
    fn full_screen_quad() {
        let mut device = RecordingDevice::new(8, 8);
        let mut quad = DefaultQuadRenderer::new();
        quad.render(&mut device, Vec2::NEG_ONE, Vec2::ONE).unwrap();

        let positions: Vec<_> = quad.vertices().iter().map(|v| v.position.truncate()).collect();
        assert_eq!(
            positions,
            [
                Vec2::new(1.0, -1.0),
                Vec2::new(-1.0, -1.0),
                Vec2::new(-1.0, 1.0),
                Vec2::new(1.0, 1.0)
            ]
        );
        assert_eq!(quad.vertices()[0].uv, Vec2::ONE);

        match &device.commands()[0] {
            DeviceCommand::DrawUserIndexed {
                vertex_count,
                indices,
                primitive_count,
                ..
            } => {
                assert_eq!(*vertex_count, 4);
                assert_eq!(indices, &QUAD_INDICES.to_vec());
                assert_eq!(*primitive_count, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
