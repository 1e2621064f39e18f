//! Polled asset references and the resolver the renderer pulls assets from
//!
//! Loading is somebody else's job. The renderer only asks a resolver for a
//! reference by name and checks [`AssetReference::is_ready`] each frame; an
//! unready asset means "skip this feature for now", never an error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::effect::{Effect, UberEffect};
use crate::model::ModelAsset;
use crate::resources::{asset_name_from_hint_path, MaterialTexture, TextureAsset};

struct AssetSlot<T> {
    name: String,
    asset: RefCell<Option<Rc<T>>>,
}

/// Shared handle to an asset that may still be loading
///
/// Clones share one slot, so resolving the asset through any clone makes it
/// visible to all of them.
pub struct AssetReference<T> {
    slot: Rc<AssetSlot<T>>,
}

impl<T> AssetReference<T> {
    /// A reference whose asset hasn't loaded yet
    pub fn pending(name: &str) -> Self {
        Self {
            slot: Rc::new(AssetSlot {
                name: name.to_string(),
                asset: RefCell::new(None),
            }),
        }
    }

    /// A reference that is ready immediately
    pub fn ready(name: &str, asset: T) -> Self {
        let reference = Self::pending(name);
        reference.resolve(asset);
        reference
    }

    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn is_ready(&self) -> bool {
        self.slot.asset.borrow().is_some()
    }

    /// The loaded asset, or `None` while loading
    pub fn asset(&self) -> Option<Rc<T>> {
        self.slot.asset.borrow().clone()
    }

    /// Complete loading; replaces any previously loaded asset
    pub fn resolve(&self, asset: T) {
        *self.slot.asset.borrow_mut() = Some(Rc::new(asset));
    }

    /// Whether two references share a slot
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.slot, &b.slot)
    }
}

impl<T> Clone for AssetReference<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for AssetReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetReference")
            .field("name", &self.slot.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Resolves named assets to polled references
pub trait AssetResolver {
    fn effect(&self, name: &str) -> AssetReference<Effect>;

    fn uber_effect(&self, name: &str) -> AssetReference<UberEffect>;

    fn texture(&self, name: &str) -> AssetReference<TextureAsset>;

    fn model(&self, name: &str) -> AssetReference<ModelAsset>;

    /// Resolve a material texture that only carries a source path
    fn texture_from_hint_path(&self, texture: &MaterialTexture) -> Option<AssetReference<TextureAsset>> {
        if let Some(asset) = &texture.asset {
            return Some(asset.clone());
        }
        texture
            .hint_path
            .as_deref()
            .map(|path| self.texture(&asset_name_from_hint_path(path)))
    }
}

/// In-memory asset store
///
/// Looking up a name that hasn't been inserted hands out a pending
/// reference; a later insert under that name resolves it in place, which is
/// how a background loader would complete an asset.
#[derive(Default)]
pub struct MemoryAssets {
    effects: RefCell<HashMap<String, AssetReference<Effect>>>,
    uber_effects: RefCell<HashMap<String, AssetReference<UberEffect>>>,
    textures: RefCell<HashMap<String, AssetReference<TextureAsset>>>,
    models: RefCell<HashMap<String, AssetReference<ModelAsset>>>,
}

fn lookup<T>(table: &RefCell<HashMap<String, AssetReference<T>>>, name: &str) -> AssetReference<T> {
    table
        .borrow_mut()
        .entry(name.to_string())
        .or_insert_with(|| AssetReference::pending(name))
        .clone()
}

fn insert<T>(table: &RefCell<HashMap<String, AssetReference<T>>>, name: &str, asset: T) -> AssetReference<T> {
    let reference = lookup(table, name);
    reference.resolve(asset);
    log::debug!("MemoryAssets: `{}` is ready", name);
    reference
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_effect(&self, name: &str, effect: Effect) -> AssetReference<Effect> {
        insert(&self.effects, name, effect)
    }

    pub fn insert_uber_effect(&self, name: &str, effect: UberEffect) -> AssetReference<UberEffect> {
        insert(&self.uber_effects, name, effect)
    }

    pub fn insert_texture(&self, name: &str, texture: TextureAsset) -> AssetReference<TextureAsset> {
        insert(&self.textures, name, texture)
    }

    pub fn insert_model(&self, name: &str, model: ModelAsset) -> AssetReference<ModelAsset> {
        insert(&self.models, name, model)
    }
}

impl AssetResolver for MemoryAssets {
    fn effect(&self, name: &str) -> AssetReference<Effect> {
        lookup(&self.effects, name)
    }

    fn uber_effect(&self, name: &str) -> AssetReference<UberEffect> {
        lookup(&self.uber_effects, name)
    }

    fn texture(&self, name: &str) -> AssetReference<TextureAsset> {
        lookup(&self.textures, name)
    }

    fn model(&self, name: &str) -> AssetReference<ModelAsset> {
        lookup(&self.models, name)
    }
}
