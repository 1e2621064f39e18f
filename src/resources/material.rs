//! Surface materials carried by model meshes

use crate::assets::AssetReference;
use crate::backend::types::Color;
use crate::resources::texture::TextureAsset;

/// A texture slot of a material
///
/// Models imported from files usually only know the texture's path on the
/// author's disk; that hint is resolved to an asset when the mesh renders.
/// A texture asset can also be bound directly.
#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub hint_path: Option<String>,
    pub asset: Option<AssetReference<TextureAsset>>,
}

impl MaterialTexture {
    pub fn from_hint_path(hint_path: &str) -> Self {
        Self {
            hint_path: Some(hint_path.to_string()),
            asset: None,
        }
    }

    pub fn from_asset(asset: AssetReference<TextureAsset>) -> Self {
        Self {
            hint_path: None,
            asset: Some(asset),
        }
    }
}

/// Material properties that select and parameterize surface effects
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub texture_diffuse: Option<MaterialTexture>,
    pub texture_normal: Option<MaterialTexture>,
    pub texture_specular: Option<MaterialTexture>,
    pub color_diffuse: Option<Color>,
    pub color_specular: Option<Color>,
    pub power_specular: Option<f32>,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_diffuse_texture(mut self, texture: MaterialTexture) -> Self {
        self.texture_diffuse = Some(texture);
        self
    }

    pub fn with_normal_map(mut self, texture: MaterialTexture) -> Self {
        self.texture_normal = Some(texture);
        self
    }

    pub fn with_specular_map(mut self, texture: MaterialTexture) -> Self {
        self.texture_specular = Some(texture);
        self
    }

    pub fn with_diffuse_color(mut self, color: Color) -> Self {
        self.color_diffuse = Some(color);
        self
    }

    pub fn with_specular(mut self, power: f32, color: Option<Color>) -> Self {
        self.power_specular = Some(power);
        self.color_specular = color;
        self
    }

    // Preset materials

    pub fn flat(color: Color) -> Self {
        Self::new("flat").with_diffuse_color(color)
    }

    pub fn textured(hint_path: &str) -> Self {
        Self::new(hint_path).with_diffuse_texture(MaterialTexture::from_hint_path(hint_path))
    }
}
