//! Deferred lighting pipeline
//!
//! Frames go through three stages:
//! 1. G-buffer - scene geometry writes color, normal and depth targets
//! 2. Lights - queued lights accumulate into a light target
//! 3. Composite - color and light targets are combined onto the back buffer

pub mod deferred;
pub mod gbuffer;
pub mod lighting;
pub mod quad;

pub use deferred::{DeferredRenderer, DeferredState};
pub use gbuffer::{GBuffer, GBufferTargets};
pub use lighting::{DirectionalLight, LightPass, PointLight};
pub use quad::{DefaultQuadRenderer, QuadRenderer};

use crate::backend::{BlendState, DepthFormat, SurfaceFormat};

/// Configuration for [`DeferredRenderer`]
#[derive(Debug, Clone)]
pub struct DeferredConfig {
    /// Full-screen effect writing default values into the G-buffer
    pub clear_gbuffer_effect: String,
    /// Effect pushed while scene geometry fills the G-buffer
    pub render_gbuffer_effect: String,
    pub directional_light_effect: String,
    pub point_light_effect: String,
    pub combine_final_effect: String,
    /// Model asset used as the point light volume; `None` uses a generated
    /// unit sphere
    pub sphere_model: Option<String>,
    pub color_format: SurfaceFormat,
    pub color_depth_format: DepthFormat,
    pub normal_format: SurfaceFormat,
    pub depth_format: SurfaceFormat,
    pub light_format: SurfaceFormat,
    /// Blend state while lights accumulate
    pub light_blend: BlendState,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            clear_gbuffer_effect: "effect.Protogame.DeferredLighting.ClearGBuffer".to_string(),
            render_gbuffer_effect: "effect.Protogame.DeferredLighting.RenderGBuffer".to_string(),
            directional_light_effect: "effect.Protogame.DeferredLighting.DirectionalLight"
                .to_string(),
            point_light_effect: "effect.Protogame.DeferredLighting.PointLight".to_string(),
            combine_final_effect: "effect.Protogame.DeferredLighting.CombineFinal".to_string(),
            sphere_model: Some("effect.Protogame.DeferredLighting.Sphere".to_string()),
            color_format: SurfaceFormat::Color,
            color_depth_format: DepthFormat::Depth24,
            normal_format: SurfaceFormat::Color,
            depth_format: SurfaceFormat::Single,
            light_format: SurfaceFormat::Color,
            light_blend: BlendState::alpha_blending(),
        }
    }
}
