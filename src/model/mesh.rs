//! A single mesh of a model and the GPU buffers built for it

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};

use crate::backend::{BufferHandle, GraphicsDevice, IndexFormat, PrimitiveType};
use crate::batcher::{InstanceSource, InstancedGeometry, RenderBatcher, RenderRequest};
use crate::context::RenderContext;
use crate::effect::{Effect, EffectId, SharedParameterSet};
use crate::error::{RenderError, RenderResult};
use crate::resources::Material;

use super::animation::AnimationPose;
use super::bone::Skeleton;
use super::mapping::{VertexMapping, VertexMappingRegistry};
use super::vertex::ModelVertex;

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a mesh instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Triangle-list mesh with lazily created GPU buffers
///
/// Vertex data is shared between instances of the same model; buffers are
/// owned by each instance. One vertex buffer is kept per effect because
/// effects read different vertex layouts.
#[derive(Debug)]
pub struct ModelMesh {
    id: MeshId,
    material: Option<Rc<Material>>,
    vertices: Rc<[ModelVertex]>,
    indices: Rc<[u32]>,
    skeleton: Option<Rc<Skeleton>>,
    registry: Rc<VertexMappingRegistry>,
    index_buffer: Option<BufferHandle>,
    vertex_buffers: HashMap<EffectId, BufferHandle>,
    mapping: Option<VertexMapping>,
    bounding_radius: Option<f32>,
    disposed: bool,
}

impl ModelMesh {
    pub fn new(
        registry: Rc<VertexMappingRegistry>,
        material: Option<Rc<Material>>,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
    ) -> Self {
        Self {
            id: MeshId::next(),
            material,
            vertices: vertices.into(),
            indices: indices.into(),
            skeleton: None,
            registry,
            index_buffer: None,
            vertex_buffers: HashMap::new(),
            mapping: None,
            bounding_radius: None,
            disposed: false,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn material(&self) -> Option<&Rc<Material>> {
        self.material.as_ref()
    }

    pub fn set_material(&mut self, material: Option<Rc<Material>>) {
        self.material = material;
    }

    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn skeleton(&self) -> Option<&Rc<Skeleton>> {
        self.skeleton.as_ref()
    }

    pub(crate) fn set_skeleton(&mut self, skeleton: Option<Rc<Skeleton>>) {
        self.skeleton = skeleton;
    }

    pub fn registry(&self) -> &Rc<VertexMappingRegistry> {
        &self.registry
    }

    /// Meshes without geometry only carry hierarchy
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    /// Bounding radius, known once a vertex buffer has been built
    pub fn bounding_radius(&self) -> Option<f32> {
        self.bounding_radius
    }

    /// Create the index buffer if it doesn't exist yet
    pub fn load_buffers(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        if self.index_buffer.is_some() {
            return Ok(());
        }
        if self.is_empty() {
            return Err(RenderError::EmptyMesh);
        }
        let buffer = device.create_index_buffer(
            IndexFormat::Uint32,
            self.indices.len(),
            bytemuck::cast_slice(&self.indices),
        )?;
        log::debug!(
            "Created index buffer {:?} for mesh {:?} ({} indices)",
            buffer,
            self.id,
            self.indices.len()
        );
        self.index_buffer = Some(buffer);
        self.disposed = false;
        Ok(())
    }

    pub fn index_buffer(&self) -> RenderResult<BufferHandle> {
        self.index_buffer.ok_or(RenderError::IndexBufferNotLoaded)
    }

    pub fn cached_vertex_buffer(&self, effect: EffectId) -> Option<BufferHandle> {
        self.vertex_buffers.get(&effect).copied()
    }

    pub fn cached_vertex_buffer_count(&self) -> usize {
        self.vertex_buffers.len()
    }

    /// The mapping used for every effect this mesh is drawn with
    fn resolve_mapping(&mut self, effect: &Effect) -> RenderResult<VertexMapping> {
        if let Some(mapping) = self.mapping {
            return Ok(mapping);
        }
        let mapping = self
            .registry
            .resolve(&self.vertices, effect)
            .ok_or_else(|| RenderError::NoVertexMapping {
                effect: effect.name().to_string(),
            })?;
        self.mapping = Some(mapping);
        Ok(mapping)
    }

    /// Vertex buffer laid out for `effect`, built on first use
    pub fn vertex_buffer_for(
        &mut self,
        device: &mut dyn GraphicsDevice,
        effect: &Effect,
    ) -> RenderResult<BufferHandle> {
        if let Some(buffer) = self.vertex_buffers.get(&effect.id()) {
            return Ok(*buffer);
        }

        let mapping = self.resolve_mapping(effect)?;
        let data = mapping.map_all(self.vertices.iter())?;
        let buffer = data.upload(device)?;

        if self.bounding_radius.is_none() {
            self.bounding_radius = Some(bounding_radius(&self.vertices));
        }

        log::debug!(
            "Created {} vertex buffer {:?} for mesh {:?} and effect `{}`",
            mapping.kind.name(),
            buffer,
            self.id,
            effect.name()
        );
        self.vertex_buffers.insert(effect.id(), buffer);
        Ok(buffer)
    }

    /// Build a draw of this mesh with `effect`
    ///
    /// Writes skinning matrices into the parameter set when it has a bones
    /// slot and the mesh has a skeleton. The request's world matrix is the
    /// context's world matrix followed by `transform`.
    pub fn create_render_request(
        &mut self,
        ctx: &mut RenderContext,
        effect: &Rc<Effect>,
        parameters: &SharedParameterSet,
        transform: Mat4,
        pose: Option<&AnimationPose>,
    ) -> RenderResult<RenderRequest> {
        if self.is_empty() {
            return Err(RenderError::EmptyMesh);
        }

        self.load_buffers(ctx.device_mut())?;
        let index_buffer = self.index_buffer()?;
        let vertex_buffer = self.vertex_buffer_for(ctx.device_mut(), effect)?;

        if let Some(skeleton) = &self.skeleton {
            let mut parameters = parameters.borrow_mut();
            if let Some(bones) = parameters.bones.as_mut() {
                skeleton.write_bones(pose, &mut bones.bones)?;
            }
        }

        let instancing = self.mapping.map(|mapping| {
            Rc::new(MeshInstanceSource {
                vertices: Rc::clone(&self.vertices),
                indices: Rc::clone(&self.indices),
                mapping,
            }) as Rc<dyn InstanceSource>
        });

        Ok(RenderRequest {
            effect: Rc::clone(effect),
            parameters: Rc::clone(parameters),
            vertex_buffer,
            index_buffer,
            primitive: PrimitiveType::TriangleList,
            world: transform * ctx.world,
            bounding_radius: self.bounding_radius.unwrap_or(0.0),
            vertex_count: self.vertices.len(),
            index_count: self.indices.len(),
            instancing,
        })
    }

    /// Build a request and draw it through `batcher` right away
    ///
    /// Use [`ModelMesh::create_render_request`] and queue the result to
    /// take part in instanced batching instead.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        batcher: &mut dyn RenderBatcher,
        effect: &Rc<Effect>,
        parameters: &SharedParameterSet,
        transform: Mat4,
        pose: Option<&AnimationPose>,
    ) -> RenderResult<()> {
        let request = self.create_render_request(ctx, effect, parameters, transform, pose)?;
        batcher.render_request_immediate(ctx, &request)
    }

    /// Release every per-effect vertex buffer
    pub fn free_cached_vertex_buffers(&mut self, device: &mut dyn GraphicsDevice) {
        if self.disposed {
            log::warn!("Freeing vertex buffers of disposed mesh {:?}", self.id);
        }
        for (effect, buffer) in self.vertex_buffers.drain() {
            log::debug!(
                "Freed vertex buffer {:?} of mesh {:?} for effect {:?}",
                buffer,
                self.id,
                effect
            );
            device.destroy_buffer(buffer);
        }
    }

    /// Release all GPU buffers; calling it again does nothing
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        if self.disposed {
            return;
        }
        self.free_cached_vertex_buffers(device);
        if let Some(buffer) = self.index_buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.disposed = true;
    }

    /// A copy sharing vertex data but with no GPU buffers
    pub fn instantiate(&self) -> Self {
        Self {
            id: MeshId::next(),
            material: self.material.clone(),
            vertices: Rc::clone(&self.vertices),
            indices: Rc::clone(&self.indices),
            skeleton: self.skeleton.clone(),
            registry: Rc::clone(&self.registry),
            index_buffer: None,
            vertex_buffers: HashMap::new(),
            mapping: self.mapping,
            bounding_radius: self.bounding_radius,
            disposed: false,
        }
    }
}

/// Twice the length of the per-axis maximum absolute position
fn bounding_radius(vertices: &[ModelVertex]) -> f32 {
    let extent = vertices
        .iter()
        .filter_map(|v| v.position)
        .fold(Vec3::ZERO, |extent, p| extent.max(p.abs()));
    extent.length() * 2.0
}

/// Re-maps a mesh's vertices once per instance for merged draws
struct MeshInstanceSource {
    vertices: Rc<[ModelVertex]>,
    indices: Rc<[u32]>,
    mapping: VertexMapping,
}

impl InstanceSource for MeshInstanceSource {
    fn instanced_geometry(&self, instances: &[Mat4]) -> RenderResult<InstancedGeometry> {
        let vertex_count = self.vertices.len();
        let index_count = self.indices.len();

        let transformed: Vec<ModelVertex> = instances
            .iter()
            .flat_map(|world| self.vertices.iter().map(move |v| v.transform(world)))
            .collect();
        let vertices = self.mapping.map_all(transformed.iter())?;

        // Slot k * index_count + i holds index i of instance k
        let mut indices = vec![0u32; instances.len() * index_count];
        for k in 0..instances.len() {
            let base = (k * vertex_count) as u32;
            for (i, index) in self.indices.iter().enumerate() {
                indices[k * index_count + i] = base + index;
            }
        }

        Ok(InstancedGeometry { vertices, indices })
    }
}
