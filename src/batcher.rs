//! Render requests and the batcher that submits them
//!
//! A [`RenderRequest`] is one queued draw. Requests for the same mesh, effect
//! and parameter set can be merged at flush time into a single instanced
//! draw: the mesh re-maps its vertices once per instance matrix into a
//! transient buffer.

use std::fmt;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::backend::{BufferHandle, IndexFormat, PrimitiveType};
use crate::context::RenderContext;
use crate::effect::{Effect, SharedParameterSet};
use crate::error::RenderResult;
use crate::model::mapping::GpuVertexData;

/// Geometry of several instances merged into one buffer pair
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedGeometry {
    pub vertices: GpuVertexData,
    pub indices: Vec<u32>,
}

/// Something that can rebuild its geometry for many world matrices at once
pub trait InstanceSource {
    fn instanced_geometry(&self, instances: &[Mat4]) -> RenderResult<InstancedGeometry>;
}

/// A single draw: buffers, effect, parameters, transform and bounds
pub struct RenderRequest {
    pub effect: Rc<Effect>,
    pub parameters: SharedParameterSet,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub primitive: PrimitiveType,
    pub world: Mat4,
    /// Conservative bounding-sphere radius around the world origin of the draw
    pub bounding_radius: f32,
    pub vertex_count: usize,
    pub index_count: usize,
    pub instancing: Option<Rc<dyn InstanceSource>>,
}

impl RenderRequest {
    pub fn primitive_count(&self) -> usize {
        self.primitive.primitive_count(self.index_count)
    }

    pub fn bounding_center(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// Requests that may share one instanced draw
    fn batches_with(&self, other: &RenderRequest) -> bool {
        self.instancing.is_some()
            && other.instancing.is_some()
            && self.effect.id() == other.effect.id()
            && self.vertex_buffer == other.vertex_buffer
            && self.index_buffer == other.index_buffer
            && Rc::ptr_eq(&self.parameters, &other.parameters)
    }
}

impl fmt::Debug for RenderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderRequest")
            .field("effect", &self.effect.name())
            .field("vertex_buffer", &self.vertex_buffer)
            .field("index_buffer", &self.index_buffer)
            .field("primitive", &self.primitive)
            .field("world", &self.world)
            .field("bounding_radius", &self.bounding_radius)
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .field("instanced", &self.instancing.is_some())
            .finish()
    }
}

/// Queues and executes render requests
pub trait RenderBatcher {
    /// Queue a request for the next flush
    fn queue_request(&mut self, ctx: &mut RenderContext, request: Rc<RenderRequest>);

    /// Draw a request right now
    fn render_request_immediate(
        &mut self,
        ctx: &mut RenderContext,
        request: &RenderRequest,
    ) -> RenderResult<()>;

    /// Draw everything queued, in queue order
    ///
    /// Implementations may merge adjacent compatible requests but never
    /// move a request past one it doesn't batch with.
    fn flush(&mut self, ctx: &mut RenderContext) -> RenderResult<()>;
}

/// Configuration for [`DefaultRenderBatcher`]
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Merge compatible requests into instanced draws
    pub enable_instancing: bool,
    /// Smallest group worth merging
    pub instancing_threshold: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            enable_instancing: true,
            instancing_threshold: 4,
        }
    }
}

/// Batcher that groups compatible requests at flush time
#[derive(Debug, Default)]
pub struct DefaultRenderBatcher {
    config: BatcherConfig,
    queue: Vec<Rc<RenderRequest>>,
}

impl DefaultRenderBatcher {
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
        }
    }

    pub fn queued(&self) -> &[Rc<RenderRequest>] {
        &self.queue
    }

    fn render_instanced(
        &mut self,
        ctx: &mut RenderContext,
        group: &[Rc<RenderRequest>],
        source: &dyn InstanceSource,
    ) -> RenderResult<()> {
        let first = &group[0];
        let worlds: Vec<Mat4> = group.iter().map(|r| r.world).collect();
        let geometry = source.instanced_geometry(&worlds)?;
        log::debug!(
            "Instancing {} draws of `{}` into {} vertices",
            group.len(),
            first.effect.name(),
            geometry.vertices.len()
        );

        let device = ctx.device_mut();
        let vertex_buffer = geometry.vertices.upload(device)?;
        let index_buffer = match device.create_index_buffer(
            IndexFormat::Uint32,
            geometry.indices.len(),
            bytemuck::cast_slice(&geometry.indices),
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                device.destroy_buffer(vertex_buffer);
                return Err(err.into());
            }
        };

        // Vertices are already in world space
        let result = draw(
            ctx,
            first,
            Mat4::IDENTITY,
            vertex_buffer,
            index_buffer,
            geometry.vertices.len(),
            geometry.indices.len(),
        );

        let device = ctx.device_mut();
        device.destroy_buffer(vertex_buffer);
        device.destroy_buffer(index_buffer);
        result
    }
}

impl RenderBatcher for DefaultRenderBatcher {
    fn queue_request(&mut self, _ctx: &mut RenderContext, request: Rc<RenderRequest>) {
        self.queue.push(request);
    }

    fn render_request_immediate(
        &mut self,
        ctx: &mut RenderContext,
        request: &RenderRequest,
    ) -> RenderResult<()> {
        draw(
            ctx,
            request,
            request.world,
            request.vertex_buffer,
            request.index_buffer,
            request.vertex_count,
            request.index_count,
        )
    }

    fn flush(&mut self, ctx: &mut RenderContext) -> RenderResult<()> {
        let queued = std::mem::take(&mut self.queue);

        // Only consecutive runs merge, so draw order matches queue order
        let mut groups: Vec<Vec<Rc<RenderRequest>>> = Vec::new();
        for request in queued {
            match groups.last_mut() {
                Some(group) if self.config.enable_instancing && group[0].batches_with(&request) => {
                    group.push(request)
                }
                _ => groups.push(vec![request]),
            }
        }

        for group in groups {
            let source = group[0].instancing.clone();
            match source {
                Some(source) if group.len() >= self.config.instancing_threshold.max(2) => {
                    self.render_instanced(ctx, &group, source.as_ref())?;
                }
                _ => {
                    for request in &group {
                        self.render_request_immediate(ctx, request)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn draw(
    ctx: &mut RenderContext,
    request: &RenderRequest,
    world: Mat4,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_count: usize,
    index_count: usize,
) -> RenderResult<()> {
    let effect = &request.effect;
    request.parameters.borrow().apply_to(effect);
    effect.set_parameter_if_declared("World", world);
    effect.set_parameter_if_declared("View", ctx.view);
    effect.set_parameter_if_declared("Projection", ctx.projection);

    let primitive_count = request.primitive.primitive_count(index_count);
    for pass in 0..effect.pass_count() {
        let device = ctx.device_mut();
        device.apply_effect_pass(effect, pass)?;
        device.draw_indexed(
            request.primitive,
            vertex_buffer,
            index_buffer,
            vertex_count,
            primitive_count,
        )?;
    }
    Ok(())
}
