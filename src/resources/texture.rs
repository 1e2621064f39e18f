//! Texture assets

use crate::backend::traits::TextureHandle;

/// A texture uploaded to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureAsset {
    pub name: String,
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl TextureAsset {
    pub fn new(name: &str, texture: TextureHandle, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            texture,
            width,
            height,
        }
    }
}

/// Convert a texture hint path from a model file into an asset name
///
/// `textures/Rock Wall.png` becomes `texture.textures.Rock_Wall`: the
/// extension is dropped, path separators become dots and spaces become
/// underscores.
pub fn asset_name_from_hint_path(hint_path: &str) -> String {
    let normalized = hint_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./").trim_start_matches('/');
    let without_extension = match trimmed.rfind('.') {
        Some(dot) if !trimmed[dot..].contains('/') => &trimmed[..dot],
        _ => trimmed,
    };

    let body: String = without_extension
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
        .replace(' ', "_");

    format!("texture.{}", body)
}
