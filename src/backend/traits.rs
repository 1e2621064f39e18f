//! Core device abstraction
//!
//! Everything the model runtime and the deferred renderer need from a GPU is
//! expressed through [`GraphicsDevice`]. Implementations own the real
//! resources; callers only hold opaque handles.

use std::any::Any;

use thiserror::Error;

use crate::backend::types::*;
use crate::effect::Effect;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create render target: {0}")]
    RenderTargetCreationFailed(String),
    #[error("Unknown buffer handle {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("Unknown texture handle {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("Invalid draw call: {0}")]
    InvalidDraw(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture; render targets are textures too
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

impl BufferHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl TextureHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Main graphics device trait
///
/// Draw calls operate on whatever state was last set; there is no implicit
/// reset between draws.
pub trait GraphicsDevice: Any {
    /// Size of the presentation back buffer
    fn back_buffer_size(&self) -> (u32, u32);

    /// Current viewport
    fn viewport(&self) -> Viewport;

    // Resource creation

    /// Create a vertex buffer holding `vertex_count` vertices of `layout`
    fn create_vertex_buffer(
        &mut self,
        layout: &VertexLayout,
        vertex_count: usize,
        data: &[u8],
    ) -> BackendResult<BufferHandle>;

    /// Create an index buffer
    fn create_index_buffer(
        &mut self,
        format: IndexFormat,
        index_count: usize,
        data: &[u8],
    ) -> BackendResult<BufferHandle>;

    /// Replace the contents of a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()>;

    /// Create a render target texture
    fn create_render_target(&mut self, desc: &RenderTargetDescriptor)
        -> BackendResult<TextureHandle>;

    // Resource cleanup

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a texture or render target
    fn destroy_texture(&mut self, texture: TextureHandle);

    // State

    /// Bind a set of render targets; an empty slice binds the back buffer
    fn set_render_targets(&mut self, targets: &[TextureHandle]);

    /// Clear the bound render targets
    fn clear(&mut self, color: Color);

    fn set_blend_state(&mut self, state: BlendState);

    fn set_depth_stencil_state(&mut self, state: DepthStencilState);

    fn set_rasterizer_state(&mut self, state: RasterizerState);

    /// Apply one pass of an effect with its current parameter values
    fn apply_effect_pass(&mut self, effect: &Effect, pass: usize) -> BackendResult<()>;

    // Draws

    /// Draw indexed primitives from device buffers
    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        vertex_count: usize,
        primitive_count: usize,
    ) -> BackendResult<()>;

    /// Draw indexed primitives from CPU-side data
    fn draw_user_indexed(
        &mut self,
        primitive: PrimitiveType,
        layout: &VertexLayout,
        vertices: &[u8],
        indices: &[u16],
        primitive_count: usize,
    ) -> BackendResult<()>;

    /// Draw a texture into a screen rectangle
    fn draw_sprite(&mut self, texture: TextureHandle, destination: Rect, tint: Color)
        -> BackendResult<()>;

    /// Allow downcasting
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
