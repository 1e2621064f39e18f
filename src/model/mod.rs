//! Skeletal models: vertex data, bones, animations, meshes and the binary
//! format they are stored in

pub mod animation;
pub mod bone;
pub mod mapping;
pub mod mesh;
#[allow(clippy::module_inception)]
pub mod model;
pub mod primitives;
pub mod serializer;
pub mod vertex;

pub use animation::{Animation, AnimationCollection, AnimationPose, KeyframeTrack};
pub use bone::{ModelBone, Skeleton, SkeletonBone};
pub use mapping::{
    DefaultModelRenderConfiguration, GpuVertexData, GpuVertexKind, ModelRenderConfiguration,
    VertexMapping, VertexMappingRegistry,
};
pub use mesh::{MeshId, ModelMesh};
pub use model::{Model, ModelAsset};
pub use serializer::ModelSerializerV1;
pub use vertex::ModelVertex;
