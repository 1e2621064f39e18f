//! G-buffer render targets
//!
//! Four targets sized to the back buffer:
//! - color (with the scene depth-stencil attachment)
//! - normal
//! - depth, as a single-channel float
//! - light accumulation

use crate::backend::{
    DepthFormat, GraphicsDevice, RenderTargetDescriptor, SurfaceFormat, TextureHandle,
};
use crate::error::RenderResult;

use super::DeferredConfig;

/// Handles of the current G-buffer targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferTargets {
    pub color: TextureHandle,
    pub normal: TextureHandle,
    pub depth: TextureHandle,
    pub light: TextureHandle,
}

impl GBufferTargets {
    /// Targets written by scene geometry, in binding order
    pub fn geometry(&self) -> [TextureHandle; 3] {
        [self.color, self.normal, self.depth]
    }
}

#[derive(Debug, Clone, Copy)]
struct SizedTarget {
    texture: TextureHandle,
    width: u32,
    height: u32,
}

/// Lazily created G-buffer that follows the back buffer size
#[derive(Debug, Default)]
pub struct GBuffer {
    color: Option<SizedTarget>,
    normal: Option<SizedTarget>,
    depth: Option<SizedTarget>,
    light: Option<SizedTarget>,
}

impl GBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current targets, if all have been created
    pub fn targets(&self) -> Option<GBufferTargets> {
        Some(GBufferTargets {
            color: self.color?.texture,
            normal: self.normal?.texture,
            depth: self.depth?.texture,
            light: self.light?.texture,
        })
    }

    /// Create missing targets and recreate any whose size no longer matches
    /// the back buffer
    pub fn ensure(
        &mut self,
        device: &mut dyn GraphicsDevice,
        config: &DeferredConfig,
    ) -> RenderResult<GBufferTargets> {
        let (width, height) = device.back_buffer_size();
        let color = ensure_target(
            device,
            &mut self.color,
            "gbuffer_color",
            (width, height),
            config.color_format,
            config.color_depth_format,
        )?;
        let normal = ensure_target(
            device,
            &mut self.normal,
            "gbuffer_normal",
            (width, height),
            config.normal_format,
            DepthFormat::None,
        )?;
        let depth = ensure_target(
            device,
            &mut self.depth,
            "gbuffer_depth",
            (width, height),
            config.depth_format,
            DepthFormat::None,
        )?;
        let light = ensure_target(
            device,
            &mut self.light,
            "gbuffer_light",
            (width, height),
            config.light_format,
            DepthFormat::None,
        )?;
        Ok(GBufferTargets {
            color,
            normal,
            depth,
            light,
        })
    }

    /// Release all targets
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in [
            &mut self.color,
            &mut self.normal,
            &mut self.depth,
            &mut self.light,
        ] {
            if let Some(target) = slot.take() {
                device.destroy_texture(target.texture);
            }
        }
    }
}

fn ensure_target(
    device: &mut dyn GraphicsDevice,
    slot: &mut Option<SizedTarget>,
    label: &str,
    (width, height): (u32, u32),
    format: SurfaceFormat,
    depth_format: DepthFormat,
) -> RenderResult<TextureHandle> {
    if let Some(target) = slot {
        if target.width == width && target.height == height {
            return Ok(target.texture);
        }
        log::debug!(
            "Recreating {} at {}x{} (was {}x{})",
            label,
            width,
            height,
            target.width,
            target.height
        );
        device.destroy_texture(target.texture);
        *slot = None;
    }

    let texture = device.create_render_target(&RenderTargetDescriptor {
        label: Some(label.to_string()),
        width,
        height,
        mip_map: false,
        format,
        depth_format,
    })?;
    *slot = Some(SizedTarget {
        texture,
        width,
        height,
    });
    Ok(texture)
}
