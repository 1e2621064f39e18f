//! Deferred renderer
//!
//! ```text
//! Idle -> begin -> GBufferActive -> end -> LightingActive -> Composited
//!  ^                                                             |
//!  +------------------------ begin ------------------------------+
//! ```
//!
//! Lights are not drawn when added. Each add queues a closure that runs, in
//! submission order, once the G-buffer is complete.

use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::assets::{AssetReference, AssetResolver};
use crate::backend::{BlendState, Color, DepthStencilState, RasterizerState, Rect};
use crate::context::RenderContext;
use crate::effect::Effect;
use crate::error::{RenderError, RenderResult};
use crate::model::mapping::VertexMappingRegistry;
use crate::model::{primitives, Model, ModelAsset, ModelMesh};

use super::gbuffer::{GBuffer, GBufferTargets};
use super::lighting::{
    draw_directional_light, draw_point_light, half_pixel, DirectionalLight, LightPass, PointLight,
};
use super::quad::{DefaultQuadRenderer, QuadRenderer};
use super::DeferredConfig;

type QueuedLight = Box<dyn FnOnce(&mut LightPass<'_>) -> RenderResult<()>>;

/// Frame stage of a [`DeferredRenderer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeferredState {
    #[default]
    Idle,
    /// Scene geometry is being written into the G-buffer
    GBufferActive,
    /// Queued lights are being drawn
    LightingActive,
    /// The frame has been composited onto the back buffer
    Composited,
}

impl DeferredState {
    pub fn name(&self) -> &'static str {
        match self {
            DeferredState::Idle => "Idle",
            DeferredState::GBufferActive => "GBufferActive",
            DeferredState::LightingActive => "LightingActive",
            DeferredState::Composited => "Composited",
        }
    }
}

pub struct DeferredRenderer {
    config: DeferredConfig,
    clear_gbuffer: AssetReference<Effect>,
    render_gbuffer: AssetReference<Effect>,
    directional_light: AssetReference<Effect>,
    point_light: AssetReference<Effect>,
    combine_final: AssetReference<Effect>,
    sphere_asset: Option<AssetReference<ModelAsset>>,
    sphere: Option<Model>,
    gbuffer: GBuffer,
    targets: Option<GBufferTargets>,
    quad: DefaultQuadRenderer,
    pending: Vec<QueuedLight>,
    pending_point_lights: usize,
    state: DeferredState,
}

impl DeferredRenderer {
    /// Look up the renderer's effects and light volume; they may finish
    /// loading later
    pub fn new(config: DeferredConfig, assets: &dyn AssetResolver) -> Self {
        Self {
            clear_gbuffer: assets.effect(&config.clear_gbuffer_effect),
            render_gbuffer: assets.effect(&config.render_gbuffer_effect),
            directional_light: assets.effect(&config.directional_light_effect),
            point_light: assets.effect(&config.point_light_effect),
            combine_final: assets.effect(&config.combine_final_effect),
            sphere_asset: config.sphere_model.as_deref().map(|name| assets.model(name)),
            sphere: None,
            gbuffer: GBuffer::new(),
            targets: None,
            quad: DefaultQuadRenderer::new(),
            pending: Vec::new(),
            pending_point_lights: 0,
            state: DeferredState::Idle,
            config,
        }
    }

    pub fn config(&self) -> &DeferredConfig {
        &self.config
    }

    pub fn state(&self) -> DeferredState {
        self.state
    }

    /// Targets of the current or last frame
    pub fn targets(&self) -> Option<GBufferTargets> {
        self.targets
    }

    pub fn pending_lights(&self) -> usize {
        self.pending.len()
    }

    pub fn add_directional_light(&mut self, direction: Vec3, color: Color) {
        let effect = self.directional_light.clone();
        let light = DirectionalLight { direction, color };
        self.queue_light(Box::new(move |pass| {
            let effect = ready_effect(&effect)?;
            draw_directional_light(pass, &effect, &light)
        }));
    }

    pub fn add_point_light(&mut self, position: Vec3, color: Color, radius: f32, intensity: f32) {
        let effect = self.point_light.clone();
        let light = PointLight {
            position,
            color,
            radius,
            intensity,
        };
        self.pending_point_lights += 1;
        self.queue_light(Box::new(move |pass| {
            let effect = ready_effect(&effect)?;
            draw_point_light(pass, &effect, &light)
        }));
    }

    fn queue_light(&mut self, light: QueuedLight) {
        if self.state != DeferredState::GBufferActive {
            log::warn!(
                "Light queued while the deferred renderer is {}",
                self.state.name()
            );
        }
        self.pending.push(light);
    }

    /// Bind and clear the G-buffer and push the G-buffer effect
    pub fn begin_deferred_rendering(&mut self, ctx: &mut RenderContext) -> RenderResult<()> {
        if !matches!(self.state, DeferredState::Idle | DeferredState::Composited) {
            return Err(RenderError::InvalidState {
                expected: "Idle",
                found: self.state.name(),
            });
        }
        let clear = ready_effect(&self.clear_gbuffer)?;
        let render = ready_effect(&self.render_gbuffer)?;

        let targets = self.gbuffer.ensure(ctx.device_mut(), &self.config)?;
        ctx.push_render_targets(&targets.geometry());
        for pass in 0..clear.pass_count() {
            let device = ctx.device_mut();
            device.apply_effect_pass(&clear, pass)?;
            self.quad.render(device, Vec2::NEG_ONE, Vec2::ONE)?;
        }
        ctx.pop_render_target()?;

        // Bound a second time; some backends drop the first binding after
        // the clear pass
        ctx.push_render_targets(&targets.geometry());
        ctx.push_effect(render);

        self.targets = Some(targets);
        self.state = DeferredState::GBufferActive;
        Ok(())
    }

    /// Draw queued lights and composite, or show the G-buffer when `debug`
    pub fn end_deferred_rendering(&mut self, ctx: &mut RenderContext, debug: bool) -> RenderResult<()> {
        if self.state != DeferredState::GBufferActive {
            return Err(RenderError::InvalidState {
                expected: "GBufferActive",
                found: self.state.name(),
            });
        }

        let result = self.finish_frame(ctx, debug);
        self.state = match result {
            Ok(()) => DeferredState::Composited,
            Err(_) => DeferredState::Idle,
        };
        self.pending.clear();
        self.pending_point_lights = 0;
        result
    }

    fn finish_frame(&mut self, ctx: &mut RenderContext, debug: bool) -> RenderResult<()> {
        let targets = self.targets.ok_or(RenderError::InvalidState {
            expected: "GBufferActive",
            found: "Idle",
        })?;

        ctx.pop_effect()?;
        ctx.pop_render_target()?;

        self.state = DeferredState::LightingActive;
        self.render_lights(ctx, targets)?;

        if debug {
            render_debug(ctx, targets)
        } else {
            self.combine_final(ctx, targets)
        }
    }

    fn render_lights(&mut self, ctx: &mut RenderContext, targets: GBufferTargets) -> RenderResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let sphere = if std::mem::take(&mut self.pending_point_lights) > 0 {
            Some(light_volume(&mut self.sphere, self.sphere_asset.as_ref())?)
        } else {
            None
        };

        ctx.push_render_targets(&[targets.light]);
        let device = ctx.device_mut();
        device.clear(Color::TRANSPARENT);
        device.set_blend_state(self.config.light_blend);
        device.set_depth_stencil_state(DepthStencilState::NONE);

        log::debug!("Drawing {} queued lights", pending.len());
        let mut pass = LightPass {
            ctx: &mut *ctx,
            targets,
            quad: &mut self.quad,
            sphere,
        };
        let drawn = pending.into_iter().try_for_each(|light| light(&mut pass));

        // Restored even when a light failed
        let device = ctx.device_mut();
        device.set_blend_state(BlendState::opaque());
        device.set_depth_stencil_state(DepthStencilState::NONE);
        device.set_rasterizer_state(RasterizerState::CULL_COUNTER_CLOCKWISE);
        let popped = ctx.pop_render_target();
        drawn.and(popped)
    }

    fn combine_final(&mut self, ctx: &mut RenderContext, targets: GBufferTargets) -> RenderResult<()> {
        let effect = ready_effect(&self.combine_final)?;
        effect.set_parameter("ColorMap", targets.color)?;
        effect.set_parameter("LightMap", targets.light)?;
        effect.set_parameter("HalfPixel", half_pixel(ctx))?;

        for pass in 0..effect.pass_count() {
            let device = ctx.device_mut();
            device.apply_effect_pass(&effect, pass)?;
            self.quad.render(device, Vec2::NEG_ONE, Vec2::ONE)?;
        }
        Ok(())
    }

    /// Release the G-buffer and the light volume's buffers
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        self.gbuffer.dispose(ctx.device_mut());
        if let Some(mut sphere) = self.sphere.take() {
            sphere.dispose(ctx.device_mut());
        }
        self.targets = None;
    }
}

fn ready_effect(reference: &AssetReference<Effect>) -> RenderResult<Rc<Effect>> {
    reference.asset().ok_or_else(|| RenderError::AssetNotReady {
        name: reference.name().to_string(),
    })
}

/// The first mesh with geometry of the light volume model, instantiated on
/// first use
fn light_volume<'a>(
    sphere: &'a mut Option<Model>,
    asset: Option<&AssetReference<ModelAsset>>,
) -> RenderResult<&'a mut ModelMesh> {
    if sphere.is_none() {
        let model = match asset {
            Some(reference) => reference
                .asset()
                .ok_or_else(|| RenderError::AssetNotReady {
                    name: reference.name().to_string(),
                })?
                .instantiate(),
            None => primitives::sphere_model(
                "light_volume",
                Rc::new(VertexMappingRegistry::with_defaults()),
            ),
        };
        *sphere = Some(model);
    }

    sphere
        .as_mut()
        .and_then(|model| model.meshes_mut().iter_mut().find(|mesh| !mesh.is_empty()))
        .ok_or(RenderError::EmptyMesh)
}

/// The four G-buffer targets in screen quadrants
fn render_debug(ctx: &mut RenderContext, targets: GBufferTargets) -> RenderResult<()> {
    let viewport = ctx.device().viewport();
    let (half_width, half_height) = (viewport.width / 2, viewport.height / 2);
    let (w, h) = (half_width as i32, half_height as i32);

    let device = ctx.device_mut();
    device.draw_sprite(targets.color, Rect::new(0, 0, half_width, half_height), Color::WHITE)?;
    device.draw_sprite(targets.normal, Rect::new(0, h, half_width, half_height), Color::WHITE)?;
    device.draw_sprite(targets.depth, Rect::new(w, 0, half_width, half_height), Color::WHITE)?;
    device.draw_sprite(targets.light, Rect::new(w, h, half_width, half_height), Color::WHITE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::backend::{DeviceCommand, RecordingDevice, VertexSemantic};
    use crate::effect::EffectParameterValue;
    use crate::pipeline::lighting::{
        COMBINE_FINAL_PARAMETERS, DIRECTIONAL_LIGHT_PARAMETERS, POINT_LIGHT_PARAMETERS,
    };
    use glam::Mat4;
    use rstest::rstest;

    fn assets(config: &DeferredConfig) -> MemoryAssets {
        let assets = MemoryAssets::new();
        assets.insert_effect(&config.clear_gbuffer_effect, Effect::new("ClearGBuffer"));
        assets.insert_effect(&config.render_gbuffer_effect, Effect::new("RenderGBuffer"));
        assets.insert_effect(
            &config.directional_light_effect,
            Effect::new("DirectionalLight").with_parameters(DIRECTIONAL_LIGHT_PARAMETERS),
        );
        assets.insert_effect(
            &config.point_light_effect,
            Effect::new("PointLight")
                .with_vertex_inputs(&[VertexSemantic::Position, VertexSemantic::Normal])
                .with_parameters(POINT_LIGHT_PARAMETERS),
        );
        assets.insert_effect(
            &config.combine_final_effect,
            Effect::new("CombineFinal").with_parameters(COMBINE_FINAL_PARAMETERS),
        );
        assets
    }

    fn renderer() -> DeferredRenderer {
        let config = DeferredConfig {
            sphere_model: None,
            ..DeferredConfig::default()
        };
        let assets = assets(&config);
        DeferredRenderer::new(config, &assets)
    }

    fn context(eye: Vec3) -> RenderContext {
        let mut ctx = RenderContext::new(RecordingDevice::new(200, 100));
        ctx.set_camera(
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
            Mat4::perspective_rh(1.0, 2.0, 0.1, 100.0),
        );
        ctx
    }

    fn recording(ctx: &RenderContext) -> &RecordingDevice {
        ctx.device_as::<RecordingDevice>().unwrap()
    }

    fn parameter(parameters: &[(String, EffectParameterValue)], name: &str) -> EffectParameterValue {
        parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap()
    }

    #[test]
    fn begin_binds_gbuffer_twice_and_pushes_effect() {
        let mut ctx = context(Vec3::Z * 10.0);
        let mut renderer = renderer();
        renderer.begin_deferred_rendering(&mut ctx).unwrap();

        let targets = renderer.targets().unwrap();
        let geometry = targets.geometry().to_vec();
        let bindings: Vec<_> = recording(&ctx)
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetRenderTargets(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(bindings, vec![geometry.clone(), Vec::new(), geometry.clone()]);
        assert_eq!(recording(&ctx).bound_targets(), geometry.as_slice());
        assert_eq!(ctx.current_effect().unwrap().name(), "RenderGBuffer");
        assert_eq!(ctx.render_target_depth(), 1);
        assert_eq!(renderer.state(), DeferredState::GBufferActive);
    }

    #[test]
    fn lights_run_in_submission_order_and_queue_empties() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut ctx = context(Vec3::Z * 50.0);
        let mut renderer = renderer();

        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.add_directional_light(Vec3::NEG_Y, Color::WHITE);
        renderer.add_point_light(Vec3::X, Color::rgb(255, 0, 0), 2.0, 1.0);
        renderer.add_point_light(Vec3::Y, Color::rgb(0, 255, 0), 3.0, 0.5);
        assert_eq!(renderer.pending_lights(), 3);

        renderer.end_deferred_rendering(&mut ctx, false).unwrap();
        assert_eq!(renderer.pending_lights(), 0);
        assert_eq!(renderer.state(), DeferredState::Composited);

        let lights: Vec<_> = recording(&ctx)
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::ApplyEffect {
                    name, parameters, ..
                } if name.ends_with("Light") => Some((name.clone(), parameters.clone())),
                _ => None,
            })
            .collect();
        let names: Vec<_> = lights.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["DirectionalLight", "PointLight", "PointLight"]);
        assert_eq!(
            parameter(&lights[1].1, "LightPosition"),
            EffectParameterValue::Vec3(Vec3::X)
        );
        assert_eq!(
            parameter(&lights[2].1, "LightRadius"),
            EffectParameterValue::Float(3.0)
        );
        assert_eq!(
            parameter(&lights[0].1, "HalfPixel"),
            EffectParameterValue::Vec2(Vec2::new(0.0025, 0.005))
        );
    }

    #[rstest]
    #[case::camera_inside(Vec3::new(0.0, 0.0, 1.0), RasterizerState::CULL_CLOCKWISE)]
    #[case::camera_outside(Vec3::new(0.0, 0.0, 10.0), RasterizerState::CULL_COUNTER_CLOCKWISE)]
    fn point_light_winding_follows_camera(#[case] eye: Vec3, #[case] expected: RasterizerState) {
        let mut ctx = context(eye);
        let mut renderer = renderer();
        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.add_point_light(Vec3::ZERO, Color::WHITE, 5.0, 1.0);
        renderer.end_deferred_rendering(&mut ctx, false).unwrap();

        let device = recording(&ctx);
        let sphere_draw = device
            .commands()
            .iter()
            .find_map(|c| match c {
                DeviceCommand::DrawIndexed {
                    rasterizer,
                    depth_stencil,
                    ..
                } => Some((*rasterizer, *depth_stencil)),
                _ => None,
            })
            .unwrap();
        assert_eq!(sphere_draw.0, expected);
        assert_eq!(sphere_draw.1, DepthStencilState::NONE);
        assert_eq!(device.rasterizer_state(), RasterizerState::CULL_COUNTER_CLOCKWISE);
        assert_eq!(device.blend_state(), BlendState::opaque());
    }

    #[test]
    fn composite_samples_color_and_light_targets() {
        let mut ctx = context(Vec3::Z * 10.0);
        let mut renderer = renderer();
        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.end_deferred_rendering(&mut ctx, false).unwrap();

        let targets = renderer.targets().unwrap();
        let device = recording(&ctx);
        let combine = device
            .commands()
            .iter()
            .find_map(|c| match c {
                DeviceCommand::ApplyEffect {
                    name, parameters, ..
                } if name == "CombineFinal" => Some(parameters.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            parameter(&combine, "ColorMap"),
            EffectParameterValue::Texture(targets.color)
        );
        assert_eq!(
            parameter(&combine, "LightMap"),
            EffectParameterValue::Texture(targets.light)
        );
        assert!(device.bound_targets().is_empty());
        assert_eq!(ctx.render_target_depth(), 0);
    }

    #[test]
    fn debug_view_shows_targets_in_quadrants() {
        let mut ctx = context(Vec3::Z * 10.0);
        let mut renderer = renderer();
        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.end_deferred_rendering(&mut ctx, true).unwrap();

        let targets = renderer.targets().unwrap();
        let sprites: Vec<_> = recording(&ctx)
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawSprite {
                    texture,
                    destination,
                    ..
                } => Some((*texture, *destination)),
                _ => None,
            })
            .collect();
        assert_eq!(
            sprites,
            vec![
                (targets.color, Rect::new(0, 0, 100, 50)),
                (targets.normal, Rect::new(0, 50, 100, 50)),
                (targets.depth, Rect::new(100, 0, 100, 50)),
                (targets.light, Rect::new(100, 50, 100, 50)),
            ]
        );
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let mut ctx = context(Vec3::Z * 10.0);
        let mut renderer = renderer();
        assert!(matches!(
            renderer.end_deferred_rendering(&mut ctx, false),
            Err(RenderError::InvalidState { .. })
        ));

        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        assert!(matches!(
            renderer.begin_deferred_rendering(&mut ctx),
            Err(RenderError::InvalidState { .. })
        ));
    }

    #[test]
    fn frames_follow_back_buffer_resizes() {
        let mut ctx = context(Vec3::Z * 10.0);
        let mut renderer = renderer();
        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.end_deferred_rendering(&mut ctx, false).unwrap();
        let first = renderer.targets().unwrap();

        ctx.device_as_mut::<RecordingDevice>()
            .unwrap()
            .set_back_buffer_size(400, 300);
        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.end_deferred_rendering(&mut ctx, false).unwrap();
        let second = renderer.targets().unwrap();

        assert_ne!(first.color, second.color);
        let device = recording(&ctx);
        assert!(!device.is_texture_live(first.color));
        assert_eq!(device.render_target_descriptor(second.light).unwrap().height, 300);
    }

    #[test]
    fn missing_effects_fail_without_changing_state() {
        let config = DeferredConfig::default();
        let assets = MemoryAssets::new();
        let mut renderer = DeferredRenderer::new(config, &assets);
        let mut ctx = context(Vec3::Z * 10.0);

        assert!(matches!(
            renderer.begin_deferred_rendering(&mut ctx),
            Err(RenderError::AssetNotReady { .. })
        ));
        assert_eq!(renderer.state(), DeferredState::Idle);
        assert_eq!(ctx.render_target_depth(), 0);
    }

    #[test]
    fn unloaded_light_volume_only_blocks_point_lights() {
        let config = DeferredConfig::default();
        let assets = assets(&config);
        let mut renderer = DeferredRenderer::new(config, &assets);
        let mut ctx = context(Vec3::Z * 10.0);

        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.add_directional_light(Vec3::NEG_Z, Color::WHITE);
        renderer.end_deferred_rendering(&mut ctx, false).unwrap();

        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.add_point_light(Vec3::ZERO, Color::WHITE, 1.0, 1.0);
        assert!(matches!(
            renderer.end_deferred_rendering(&mut ctx, false),
            Err(RenderError::AssetNotReady { .. })
        ));
        assert_eq!(renderer.pending_lights(), 0);
        assert_eq!(renderer.state(), DeferredState::Idle);
        assert_eq!(ctx.render_target_depth(), 0);
    }

    #[test]
    fn failing_light_restores_device_state() {
        let config = DeferredConfig {
            sphere_model: None,
            ..DeferredConfig::default()
        };
        let assets = assets(&config);
        // No declared parameters, so setting the light direction fails
        assets.insert_effect(&config.directional_light_effect, Effect::new("DirectionalLight"));
        let mut renderer = DeferredRenderer::new(config, &assets);
        let mut ctx = context(Vec3::new(0.0, 0.0, 1.0));

        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        renderer.add_point_light(Vec3::ZERO, Color::WHITE, 5.0, 1.0);
        renderer.add_directional_light(Vec3::NEG_Z, Color::WHITE);
        assert!(matches!(
            renderer.end_deferred_rendering(&mut ctx, false),
            Err(RenderError::MissingParameter { .. })
        ));

        assert_eq!(renderer.state(), DeferredState::Idle);
        assert_eq!(ctx.render_target_depth(), 0);
        let device = recording(&ctx);
        assert!(device.bound_targets().is_empty());
        assert_eq!(device.blend_state(), BlendState::opaque());
        assert_eq!(device.depth_stencil_state(), DepthStencilState::NONE);
        assert_eq!(device.rasterizer_state(), RasterizerState::CULL_COUNTER_CLOCKWISE);

        renderer.begin_deferred_rendering(&mut ctx).unwrap();
        assert_eq!(ctx.render_target_depth(), 1);
    }
}
