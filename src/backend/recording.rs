//! Headless recording device
//!
//! This device doesn't talk to a GPU. It hands out handles, keeps the bytes
//! written to each buffer, tracks bound state, and appends every call to a
//! command log that tests and offline tools can inspect.

use std::any::Any;
use std::collections::HashMap;

use crate::effect::{Effect, EffectId, EffectParameterValue};

use super::traits::*;
use super::types::*;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateVertexBuffer {
        buffer: BufferHandle,
        stride: u32,
        vertex_count: usize,
    },
    CreateIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
        index_count: usize,
    },
    WriteBuffer {
        buffer: BufferHandle,
        size: usize,
    },
    CreateRenderTarget {
        texture: TextureHandle,
        descriptor: RenderTargetDescriptor,
    },
    DestroyBuffer(BufferHandle),
    DestroyTexture(TextureHandle),
    SetRenderTargets(Vec<TextureHandle>),
    Clear(Color),
    SetBlendState(BlendState),
    SetDepthStencilState(DepthStencilState),
    SetRasterizerState(RasterizerState),
    /// An effect pass applied with a snapshot of its parameter values
    ApplyEffect {
        effect: EffectId,
        name: String,
        pass: usize,
        parameters: Vec<(String, EffectParameterValue)>,
    },
    DrawIndexed {
        primitive: PrimitiveType,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        vertex_count: usize,
        primitive_count: usize,
        rasterizer: RasterizerState,
        depth_stencil: DepthStencilState,
    },
    DrawUserIndexed {
        primitive: PrimitiveType,
        vertex_count: usize,
        indices: Vec<u16>,
        primitive_count: usize,
    },
    DrawSprite {
        texture: TextureHandle,
        destination: Rect,
        tint: Color,
    },
}

impl DeviceCommand {
    /// Whether this command submits geometry
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            DeviceCommand::DrawIndexed { .. }
                | DeviceCommand::DrawUserIndexed { .. }
                | DeviceCommand::DrawSprite { .. }
        )
    }
}

/// Headless [`GraphicsDevice`] that records every command
#[derive(Debug)]
pub struct RecordingDevice {
    back_buffer: (u32, u32),
    viewport: Option<Viewport>,
    next_handle: u64,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, RenderTargetDescriptor>,
    bound_targets: Vec<TextureHandle>,
    blend: BlendState,
    depth_stencil: DepthStencilState,
    rasterizer: RasterizerState,
    commands: Vec<DeviceCommand>,
}

impl RecordingDevice {
    /// Create a device with the given back buffer size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            back_buffer: (width, height),
            viewport: None,
            next_handle: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound_targets: Vec::new(),
            blend: BlendState::default(),
            depth_stencil: DepthStencilState::default(),
            rasterizer: RasterizerState::default(),
            commands: Vec::new(),
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Recording Device"
    }

    /// Simulate a window resize
    pub fn set_back_buffer_size(&mut self, width: u32, height: u32) {
        self.back_buffer = (width, height);
    }

    /// Override the viewport; by default it covers the back buffer
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn is_buffer_live(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    pub fn is_texture_live(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    /// Bytes last written to a buffer
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn render_target_descriptor(&self, texture: TextureHandle) -> Option<&RenderTargetDescriptor> {
        self.textures.get(&texture)
    }

    pub fn bound_targets(&self) -> &[TextureHandle] {
        &self.bound_targets
    }

    pub fn blend_state(&self) -> BlendState {
        self.blend
    }

    pub fn depth_stencil_state(&self) -> DepthStencilState {
        self.depth_stencil
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.rasterizer
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn record(&mut self, command: DeviceCommand) {
        log::trace!("RecordingDevice: {:?}", command);
        self.commands.push(command);
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn back_buffer_size(&self) -> (u32, u32) {
        self.back_buffer
    }

    fn viewport(&self) -> Viewport {
        self.viewport.unwrap_or(Viewport {
            x: 0,
            y: 0,
            width: self.back_buffer.0,
            height: self.back_buffer.1,
        })
    }

    fn create_vertex_buffer(
        &mut self,
        layout: &VertexLayout,
        vertex_count: usize,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let expected = layout.stride as usize * vertex_count;
        if data.len() != expected {
            return Err(BackendError::BufferCreationFailed(format!(
                "expected {} bytes for {} vertices of stride {}, got {}",
                expected,
                vertex_count,
                layout.stride,
                data.len()
            )));
        }

        let buffer = BufferHandle(self.allocate());
        self.buffers.insert(buffer, data.to_vec());
        self.record(DeviceCommand::CreateVertexBuffer {
            buffer,
            stride: layout.stride,
            vertex_count,
        });
        Ok(buffer)
    }

    fn create_index_buffer(
        &mut self,
        format: IndexFormat,
        index_count: usize,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if data.len() != format.size() * index_count {
            return Err(BackendError::BufferCreationFailed(format!(
                "index data of {} bytes does not hold {} indices",
                data.len(),
                index_count
            )));
        }

        let buffer = BufferHandle(self.allocate());
        self.buffers.insert(buffer, data.to_vec());
        self.record(DeviceCommand::CreateIndexBuffer {
            buffer,
            format,
            index_count,
        });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()> {
        let contents = self
            .buffers
            .get_mut(&buffer)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        contents.clear();
        contents.extend_from_slice(data);
        self.record(DeviceCommand::WriteBuffer {
            buffer,
            size: data.len(),
        });
        Ok(())
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::RenderTargetCreationFailed(format!(
                "{:?} has zero size",
                desc.label
            )));
        }

        let texture = TextureHandle(self.allocate());
        self.textures.insert(texture, desc.clone());
        self.record(DeviceCommand::CreateRenderTarget {
            texture,
            descriptor: desc.clone(),
        });
        Ok(texture)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("RecordingDevice: destroying unknown buffer {:?}", buffer);
            return;
        }
        self.record(DeviceCommand::DestroyBuffer(buffer));
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            log::warn!("RecordingDevice: destroying unknown texture {:?}", texture);
            return;
        }
        self.bound_targets.retain(|bound| *bound != texture);
        self.record(DeviceCommand::DestroyTexture(texture));
    }

    fn set_render_targets(&mut self, targets: &[TextureHandle]) {
        self.bound_targets = targets.to_vec();
        self.record(DeviceCommand::SetRenderTargets(targets.to_vec()));
    }

    fn clear(&mut self, color: Color) {
        self.record(DeviceCommand::Clear(color));
    }

    fn set_blend_state(&mut self, state: BlendState) {
        self.blend = state;
        self.record(DeviceCommand::SetBlendState(state));
    }

    fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.depth_stencil = state;
        self.record(DeviceCommand::SetDepthStencilState(state));
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.rasterizer = state;
        self.record(DeviceCommand::SetRasterizerState(state));
    }

    fn apply_effect_pass(&mut self, effect: &Effect, pass: usize) -> BackendResult<()> {
        if pass >= effect.pass_count() {
            return Err(BackendError::InvalidDraw(format!(
                "effect `{}` has {} passes, pass {} requested",
                effect.name(),
                effect.pass_count(),
                pass
            )));
        }

        self.record(DeviceCommand::ApplyEffect {
            effect: effect.id(),
            name: effect.name().to_string(),
            pass,
            parameters: effect.parameter_values(),
        });
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        vertex_count: usize,
        primitive_count: usize,
    ) -> BackendResult<()> {
        if !self.buffers.contains_key(&vertex_buffer) {
            return Err(BackendError::UnknownBuffer(vertex_buffer));
        }
        if !self.buffers.contains_key(&index_buffer) {
            return Err(BackendError::UnknownBuffer(index_buffer));
        }

        self.record(DeviceCommand::DrawIndexed {
            primitive,
            vertex_buffer,
            index_buffer,
            vertex_count,
            primitive_count,
            rasterizer: self.rasterizer,
            depth_stencil: self.depth_stencil,
        });
        Ok(())
    }

    fn draw_user_indexed(
        &mut self,
        primitive: PrimitiveType,
        layout: &VertexLayout,
        vertices: &[u8],
        indices: &[u16],
        primitive_count: usize,
    ) -> BackendResult<()> {
        if layout.stride == 0 || vertices.len() % layout.stride as usize != 0 {
            return Err(BackendError::InvalidDraw(format!(
                "{} vertex bytes are not a multiple of stride {}",
                vertices.len(),
                layout.stride
            )));
        }

        self.record(DeviceCommand::DrawUserIndexed {
            primitive,
            vertex_count: vertices.len() / layout.stride as usize,
            indices: indices.to_vec(),
            primitive_count,
        });
        Ok(())
    }

    fn draw_sprite(
        &mut self,
        texture: TextureHandle,
        destination: Rect,
        tint: Color,
    ) -> BackendResult<()> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::UnknownTexture(texture));
        }

        self.record(DeviceCommand::DrawSprite {
            texture,
            destination,
            tint,
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
