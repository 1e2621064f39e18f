//! Resources referenced by models: materials and textures

pub mod material;
pub mod texture;

pub use material::{Material, MaterialTexture};
pub use texture::{asset_name_from_hint_path, TextureAsset};
