//! Per-frame render context
//!
//! Owns the device and the render-target and effect stacks, along with the
//! camera matrices every draw reads.

use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::backend::{GraphicsDevice, TextureHandle};
use crate::effect::Effect;
use crate::error::{RenderError, RenderResult};

/// Kind of render pass currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPassKind {
    #[default]
    Scene3D,
    Canvas2D,
    PostProcess,
}

impl RenderPassKind {
    pub fn is_3d(&self) -> bool {
        matches!(self, RenderPassKind::Scene3D)
    }
}

/// Render state shared by everything drawn in a frame
pub struct RenderContext {
    device: Box<dyn GraphicsDevice>,
    render_targets: Vec<Vec<TextureHandle>>,
    effects: Vec<Rc<Effect>>,
    pass: RenderPassKind,
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
}

impl RenderContext {
    pub fn new(device: impl GraphicsDevice) -> Self {
        Self::from_boxed(Box::new(device))
    }

    pub fn from_boxed(device: Box<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            render_targets: Vec::new(),
            effects: Vec::new(),
            pass: RenderPassKind::default(),
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
        }
    }

    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// Downcast the device to its concrete type
    pub fn device_as<T: GraphicsDevice>(&self) -> Option<&T> {
        self.device.as_any().downcast_ref::<T>()
    }

    pub fn device_as_mut<T: GraphicsDevice>(&mut self) -> Option<&mut T> {
        self.device.as_any_mut().downcast_mut::<T>()
    }

    /// Place the camera; the camera position is derived from the view matrix
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.camera_position = view.inverse().w_axis.truncate();
    }

    // Render targets

    /// Bind a set of targets, remembering the previous binding
    pub fn push_render_targets(&mut self, targets: &[TextureHandle]) {
        self.render_targets.push(targets.to_vec());
        self.device.set_render_targets(targets);
    }

    /// Restore the binding that was active before the last push
    pub fn pop_render_target(&mut self) -> RenderResult<()> {
        self.render_targets
            .pop()
            .ok_or(RenderError::RenderTargetStackUnderflow)?;

        match self.render_targets.last() {
            Some(previous) => {
                let previous = previous.clone();
                self.device.set_render_targets(&previous);
            }
            None => self.device.set_render_targets(&[]),
        }
        Ok(())
    }

    pub fn render_target_depth(&self) -> usize {
        self.render_targets.len()
    }

    // Effects

    pub fn push_effect(&mut self, effect: Rc<Effect>) {
        self.effects.push(effect);
    }

    pub fn pop_effect(&mut self) -> RenderResult<Rc<Effect>> {
        self.effects.pop().ok_or(RenderError::EffectStackUnderflow)
    }

    pub fn current_effect(&self) -> Option<&Rc<Effect>> {
        self.effects.last()
    }

    // Passes

    pub fn set_render_pass(&mut self, pass: RenderPassKind) {
        self.pass = pass;
    }

    pub fn render_pass(&self) -> RenderPassKind {
        self.pass
    }

    pub fn is_3d_pass(&self) -> bool {
        self.pass.is_3d()
    }
}
