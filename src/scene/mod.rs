//! Scene-side adapters that turn models into render requests

pub mod model_component;

pub use model_component::{
    MaterialFactory, ModelComponentConfig, ModelRenderComponent, SurfaceMode,
};
