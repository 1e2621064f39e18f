//! Light draws into the light accumulation target
//!
//! Directional lights cover the screen with a quad. Point lights rasterize a
//! sphere scaled to the light radius, so only pixels the light can reach are
//! shaded.

use glam::{Mat4, Vec2, Vec3};

use crate::backend::{Color, DepthStencilState, PrimitiveType, RasterizerState};
use crate::context::RenderContext;
use crate::effect::Effect;
use crate::error::{RenderError, RenderResult};
use crate::model::ModelMesh;

use super::gbuffer::GBufferTargets;
use super::quad::QuadRenderer;

/// Parameters the directional light effect must declare
pub const DIRECTIONAL_LIGHT_PARAMETERS: &[&str] = &[
    "ColorMap",
    "NormalMap",
    "DepthMap",
    "LightDirection",
    "Color",
    "CameraPosition",
    "InvertViewProjection",
    "HalfPixel",
];

/// Parameters the point light effect must declare
pub const POINT_LIGHT_PARAMETERS: &[&str] = &[
    "ColorMap",
    "NormalMap",
    "DepthMap",
    "World",
    "View",
    "Projection",
    "LightPosition",
    "Color",
    "LightRadius",
    "LightIntensity",
    "CameraPosition",
    "InvertViewProjection",
    "HalfPixel",
];

/// Parameters the combine-final effect must declare
pub const COMBINE_FINAL_PARAMETERS: &[&str] = &["ColorMap", "LightMap", "HalfPixel"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Color,
    pub radius: f32,
    pub intensity: f32,
}

impl PointLight {
    /// Light volume transform: the unit sphere scaled to the radius
    pub fn world(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(Vec3::splat(self.radius))
    }

    /// Whether `point` is strictly inside the light volume
    pub fn contains(&self, point: Vec3) -> bool {
        point.distance(self.position) < self.radius
    }
}

/// Everything a queued light needs while the light target is bound
pub struct LightPass<'a> {
    pub ctx: &'a mut RenderContext,
    pub targets: GBufferTargets,
    pub quad: &'a mut dyn QuadRenderer,
    /// Light volume mesh; only present when point lights are queued
    pub sphere: Option<&'a mut ModelMesh>,
}

/// `0.5 / back buffer size`, the texel offset effects sample with
pub fn half_pixel(ctx: &RenderContext) -> Vec2 {
    let (width, height) = ctx.device().back_buffer_size();
    Vec2::new(0.5 / width.max(1) as f32, 0.5 / height.max(1) as f32)
}

fn set_common_parameters(pass: &LightPass<'_>, effect: &Effect) -> RenderResult<()> {
    let ctx = &*pass.ctx;
    effect.set_parameter("ColorMap", pass.targets.color)?;
    effect.set_parameter("NormalMap", pass.targets.normal)?;
    effect.set_parameter("DepthMap", pass.targets.depth)?;
    effect.set_parameter("CameraPosition", ctx.camera_position)?;
    effect.set_parameter(
        "InvertViewProjection",
        (ctx.projection * ctx.view).inverse(),
    )?;
    effect.set_parameter("HalfPixel", half_pixel(ctx))?;
    Ok(())
}

pub fn draw_directional_light(
    pass: &mut LightPass<'_>,
    effect: &Effect,
    light: &DirectionalLight,
) -> RenderResult<()> {
    set_common_parameters(pass, effect)?;
    effect.set_parameter("LightDirection", light.direction)?;
    effect.set_parameter("Color", light.color.to_vec3())?;

    for index in 0..effect.pass_count() {
        let device = pass.ctx.device_mut();
        device.apply_effect_pass(effect, index)?;
        pass.quad.render(device, Vec2::NEG_ONE, Vec2::ONE)?;
    }
    Ok(())
}

pub fn draw_point_light(
    pass: &mut LightPass<'_>,
    effect: &Effect,
    light: &PointLight,
) -> RenderResult<()> {
    set_common_parameters(pass, effect)?;
    effect.set_parameter("World", light.world())?;
    effect.set_parameter("View", pass.ctx.view)?;
    effect.set_parameter("Projection", pass.ctx.projection)?;
    effect.set_parameter("LightPosition", light.position)?;
    effect.set_parameter("Color", light.color.to_vec3())?;
    effect.set_parameter("LightRadius", light.radius)?;
    effect.set_parameter("LightIntensity", light.intensity)?;

    let Some(sphere) = pass.sphere.as_deref_mut() else {
        return Err(RenderError::AssetNotReady {
            name: "point light sphere".to_string(),
        });
    };
    let device = pass.ctx.device_mut();
    sphere.load_buffers(device)?;
    let index_buffer = sphere.index_buffer()?;
    let vertex_buffer = sphere.vertex_buffer_for(device, effect)?;
    let vertex_count = sphere.vertices().len();
    let primitive_count = PrimitiveType::TriangleList.primitive_count(sphere.indices().len());

    // Inside the volume the front faces are behind the camera
    let camera_inside = light.contains(pass.ctx.camera_position);
    let device = pass.ctx.device_mut();
    device.set_rasterizer_state(if camera_inside {
        RasterizerState::CULL_CLOCKWISE
    } else {
        RasterizerState::CULL_COUNTER_CLOCKWISE
    });
    device.set_depth_stencil_state(DepthStencilState::NONE);

    for index in 0..effect.pass_count() {
        device.apply_effect_pass(effect, index)?;
        device.draw_indexed(
            PrimitiveType::TriangleList,
            vertex_buffer,
            index_buffer,
            vertex_count,
            primitive_count,
        )?;
    }

    device.set_rasterizer_state(RasterizerState::CULL_COUNTER_CLOCKWISE);
    device.set_depth_stencil_state(DepthStencilState::DEFAULT);
    Ok(())
}
