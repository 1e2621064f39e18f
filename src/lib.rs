//! Lilium Deferred - skeletal model runtime and deferred-lighting renderer
//!
//! The crate draws through a [`GraphicsDevice`] trait; [`RecordingDevice`]
//! implements it headlessly by recording every command, which is what the
//! tests render against.
//!
//! # Features
//! - Skeletal models: bone hierarchies, keyframe animation, binary model format
//! - Per-effect vertex mapping with cached vertex buffers per mesh
//! - Render requests with instanced batching
//! - Deferred lighting: G-buffer, queued directional and point lights, composite
//! - Model render component that only rebuilds what changed between frames

pub mod assets;
pub mod backend;
pub mod batcher;
pub mod context;
pub mod effect;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod resources;
pub mod scene;

pub use assets::{AssetReference, AssetResolver, MemoryAssets};
pub use backend::{GraphicsDevice, RecordingDevice};
pub use batcher::{BatcherConfig, DefaultRenderBatcher, RenderBatcher, RenderRequest};
pub use context::{RenderContext, RenderPassKind};
pub use effect::{Effect, EffectParameterSet, EffectSemantic, UberEffect};
pub use error::{RenderError, RenderResult, SerializeError, SerializeResult};
pub use model::{Model, ModelAsset, ModelMesh, ModelSerializerV1};
pub use pipeline::{DeferredConfig, DeferredRenderer, DeferredState};
pub use resources::{Material, MaterialTexture, TextureAsset};
pub use scene::{ModelComponentConfig, ModelRenderComponent};
