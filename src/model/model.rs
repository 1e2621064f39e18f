//! Models: meshes sharing one skeleton and animation set

use std::rc::Rc;

use glam::Mat4;

use crate::backend::GraphicsDevice;
use crate::batcher::{RenderBatcher, RenderRequest};
use crate::context::RenderContext;
use crate::effect::{Effect, SharedParameterSet};
use crate::error::{RenderResult, SerializeResult};

use super::animation::{Animation, AnimationCollection, AnimationPose};
use super::bone::{ModelBone, Skeleton, SkeletonBone};
use super::mesh::ModelMesh;
use super::serializer::ModelSerializerV1;

/// A renderable model
///
/// The bone tree is flattened once on construction and the resulting
/// [`Skeleton`] is shared by every mesh.
#[derive(Debug)]
pub struct Model {
    name: String,
    animations: AnimationCollection,
    meshes: Vec<ModelMesh>,
    root: Option<ModelBone>,
    skeleton: Option<Rc<Skeleton>>,
    pose: Option<AnimationPose>,
}

impl Model {
    pub fn new(
        name: &str,
        animations: AnimationCollection,
        mut meshes: Vec<ModelMesh>,
        root: Option<ModelBone>,
    ) -> Self {
        let skeleton = root.as_ref().map(|root| Rc::new(Skeleton::flatten(root)));
        for mesh in &mut meshes {
            mesh.set_skeleton(skeleton.clone());
        }
        Self {
            name: name.to_string(),
            animations,
            meshes,
            root,
            skeleton,
            pose: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn animations(&self) -> &AnimationCollection {
        &self.animations
    }

    pub fn meshes(&self) -> &[ModelMesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [ModelMesh] {
        &mut self.meshes
    }

    pub fn root(&self) -> Option<&ModelBone> {
        self.root.as_ref()
    }

    /// Flattened bones, `None` for models without a skeleton
    pub fn skeleton(&self) -> Option<&Rc<Skeleton>> {
        self.skeleton.as_ref()
    }

    pub fn bone(&self, name: &str) -> Option<&SkeletonBone> {
        self.skeleton.as_ref()?.bone(name)
    }

    /// Pose used by subsequent renders; `None` renders the default pose
    pub fn set_pose(&mut self, pose: Option<AnimationPose>) {
        self.pose = pose;
    }

    pub fn apply_animation(&mut self, animation: Rc<Animation>, time_seconds: f64) {
        self.pose = Some(AnimationPose::new(animation, time_seconds));
    }

    pub fn pose(&self) -> Option<&AnimationPose> {
        self.pose.as_ref()
    }

    /// Draw every mesh through `batcher` right away
    ///
    /// Fails with [`RenderError::EmptyMesh`](crate::error::RenderError::EmptyMesh)
    /// before drawing anything if a mesh has no geometry.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        batcher: &mut dyn RenderBatcher,
        effect: &Rc<Effect>,
        parameters: &SharedParameterSet,
        transform: Mat4,
    ) -> RenderResult<()> {
        for request in self.create_render_requests(ctx, effect, parameters, transform)? {
            batcher.render_request_immediate(ctx, &request)?;
        }
        Ok(())
    }

    /// One request per mesh, in mesh order
    pub fn create_render_requests(
        &mut self,
        ctx: &mut RenderContext,
        effect: &Rc<Effect>,
        parameters: &SharedParameterSet,
        transform: Mat4,
    ) -> RenderResult<Vec<RenderRequest>> {
        let pose = self.pose.as_ref();
        self.meshes
            .iter_mut()
            .map(|mesh| mesh.create_render_request(ctx, effect, parameters, transform, pose))
            .collect()
    }

    pub fn load_buffers(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        for mesh in &mut self.meshes {
            mesh.load_buffers(device)?;
        }
        Ok(())
    }

    pub fn free_cached_vertex_buffers(&mut self, device: &mut dyn GraphicsDevice) {
        for mesh in &mut self.meshes {
            mesh.free_cached_vertex_buffers(device);
        }
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        for mesh in &mut self.meshes {
            mesh.dispose(device);
        }
    }

    /// A copy sharing vertex, bone and animation data with its own buffers
    pub fn instantiate(&self) -> Self {
        Self {
            name: self.name.clone(),
            animations: self.animations.clone(),
            meshes: self.meshes.iter().map(ModelMesh::instantiate).collect(),
            root: self.root.clone(),
            skeleton: self.skeleton.clone(),
            pose: None,
        }
    }
}

/// A loaded model used as a template for per-entity instances
#[derive(Debug)]
pub struct ModelAsset {
    template: Model,
}

impl ModelAsset {
    pub fn new(template: Model) -> Self {
        Self { template }
    }

    /// Decode a model from the binary format
    pub fn from_bytes(name: &str, bytes: &[u8], serializer: &ModelSerializerV1) -> SerializeResult<Self> {
        Ok(Self::new(serializer.deserialize(name, bytes)?))
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn template(&self) -> &Model {
        &self.template
    }

    pub fn instantiate(&self) -> Model {
        self.template.instantiate()
    }
}
