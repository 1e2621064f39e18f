//! Per-entity model rendering with cached render requests
//!
//! Each mesh keeps one [`MeshRenderCache`] record: the inputs it last saw
//! (mesh, material, resolved textures, specular settings) and the outputs
//! built from them (effect, parameter set, render request). A render call
//! rebuilds only what a changed input feeds into. When nothing changed the
//! previous `Rc<RenderRequest>` is queued again.

use std::rc::Rc;

use glam::Mat4;

use crate::assets::{AssetReference, AssetResolver};
use crate::backend::{Color, TextureHandle};
use crate::batcher::{RenderBatcher, RenderRequest};
use crate::context::RenderContext;
use crate::effect::{Effect, EffectId, SharedParameterSet, UberEffect};
use crate::error::{RenderError, RenderResult};
use crate::model::{Animation, MeshId, Model, ModelAsset, ModelMesh};
use crate::resources::{Material, TextureAsset};

/// Configuration for [`ModelRenderComponent`]
#[derive(Debug, Clone)]
pub struct ModelComponentConfig {
    /// Uber effect whose variants are used when no explicit effect is set
    pub uber_effect: String,
    /// Appended to the variant name for meshes with a skeleton
    pub skinned_suffix: String,
}

impl Default for ModelComponentConfig {
    fn default() -> Self {
        Self {
            uber_effect: "effect.BuiltinSurface".to_string(),
            skinned_suffix: "Skinned".to_string(),
        }
    }
}

/// How a material is shaded by the default effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceMode {
    /// Diffuse texture, optionally with normal and specular maps
    Texture,
    /// Constant diffuse color
    Diffuse,
    /// Vertex colors
    #[default]
    Color,
}

/// Builds a replacement material from a mesh's own material
pub type MaterialFactory = Box<dyn Fn(Option<&Rc<Material>>) -> Rc<Material>>;

/// Values last written into a parameter set
#[derive(Debug, Clone, Default, PartialEq)]
struct AppliedParameters {
    diffuse_texture: Option<TextureHandle>,
    normal_map: Option<TextureHandle>,
    specular_power: Option<f32>,
    specular_color_map: Option<TextureHandle>,
    specular_color: Option<Color>,
    diffuse_color: Option<Color>,
}

#[derive(Debug, Default)]
struct MeshRenderCache {
    mesh: Option<MeshId>,
    material: Option<Rc<Material>>,
    mode: SurfaceMode,
    skinned: bool,
    diffuse: Option<AssetReference<TextureAsset>>,
    normal_map: Option<AssetReference<TextureAsset>>,
    specular_map: Option<AssetReference<TextureAsset>>,
    specular_color: Option<Color>,
    specular_power: Option<f32>,
    diffuse_color: Option<Color>,

    effect: Option<Rc<Effect>>,
    parameters: Option<SharedParameterSet>,
    parameters_effect: Option<EffectId>,
    applied: AppliedParameters,
    request: Option<Rc<RenderRequest>>,
}

fn ready_texture(reference: &Option<AssetReference<TextureAsset>>) -> Option<TextureHandle> {
    reference
        .as_ref()
        .and_then(AssetReference::asset)
        .map(|asset| asset.texture)
}

impl MeshRenderCache {
    /// Re-read the material when the mesh or material changed
    fn update_inputs(
        &mut self,
        mesh: &ModelMesh,
        material: &Rc<Material>,
        assets: &dyn AssetResolver,
        reasons: &mut Vec<&'static str>,
    ) {
        let material_changed = !self
            .material
            .as_ref()
            .is_some_and(|last| Rc::ptr_eq(last, material));
        let mesh_changed = self.mesh != Some(mesh.id());
        if !material_changed && !mesh_changed {
            return;
        }
        if material_changed {
            reasons.push("material");
        }
        if mesh_changed {
            reasons.push("model");
        }

        self.mesh = Some(mesh.id());
        self.material = Some(Rc::clone(material));
        self.skinned = mesh.skeleton().is_some();
        self.diffuse = None;
        self.normal_map = None;
        self.specular_map = None;
        self.specular_color = None;
        self.specular_power = None;
        self.diffuse_color = material.color_diffuse;

        self.mode = if let Some(diffuse) = &material.texture_diffuse {
            self.diffuse = assets.texture_from_hint_path(diffuse);
            self.normal_map = material
                .texture_normal
                .as_ref()
                .and_then(|texture| assets.texture_from_hint_path(texture));
            if let Some(power) = material.power_specular {
                self.specular_power = Some(power);
                match &material.texture_specular {
                    Some(texture) => self.specular_map = assets.texture_from_hint_path(texture),
                    None => self.specular_color = material.color_specular,
                }
            }
            SurfaceMode::Texture
        } else if material.color_diffuse.is_some() {
            SurfaceMode::Diffuse
        } else {
            SurfaceMode::Color
        };

        // Variant selection and every bound value depend on the above
        self.effect = None;
        self.parameters = None;
    }

    /// Name of the uber effect variant for the cached inputs
    fn variant_name(&self, skinned_suffix: &str) -> String {
        let base = match self.mode {
            SurfaceMode::Texture => match (&self.normal_map, self.specular_power) {
                (Some(_), Some(_)) if self.specular_map.is_some() => "TextureNormalSpecColMap",
                (Some(_), Some(_)) if self.specular_color.is_some() => "TextureNormalSpecColCon",
                (Some(_), Some(_)) => "TextureNormalSpecColDef",
                (Some(_), None) => "TextureNormal",
                (None, _) => "Texture",
            },
            SurfaceMode::Diffuse => "Diffuse",
            SurfaceMode::Color => "Color",
        };
        if self.skinned {
            format!("{}{}", base, skinned_suffix)
        } else {
            base.to_string()
        }
    }

    /// Values a fresh parameter set for `effect` would receive right now
    fn desired_parameters(&self, parameters: &SharedParameterSet) -> AppliedParameters {
        let set = parameters.borrow();
        let mut desired = AppliedParameters::default();
        if set.texture.is_some() {
            desired.diffuse_texture = ready_texture(&self.diffuse);
        }
        if set.normal_map.is_some() {
            desired.normal_map = ready_texture(&self.normal_map);
        }
        if set.specular.is_some() {
            if let Some(power) = self.specular_power {
                desired.specular_power = Some(power);
                match ready_texture(&self.specular_map) {
                    Some(map) => desired.specular_color_map = Some(map),
                    None => desired.specular_color = self.specular_color,
                }
            }
        }
        if set.diffuse_color.is_some() {
            desired.diffuse_color = Some(self.diffuse_color.unwrap_or(Color::BLACK));
        }
        desired
    }

    /// Reuse the cached parameter set unless its effect or any value it
    /// should carry changed
    fn parameter_set(&mut self, effect: &Rc<Effect>, reasons: &mut Vec<&'static str>) -> SharedParameterSet {
        if let Some(parameters) = &self.parameters {
            if self.parameters_effect == Some(effect.id())
                && self.desired_parameters(parameters) == self.applied
            {
                return Rc::clone(parameters);
            }
        }
        reasons.push("parameterset");

        let parameters = effect.create_parameter_set();
        let desired = self.desired_parameters(&parameters);
        {
            let mut set = parameters.borrow_mut();
            if let Some(slot) = set.texture.as_mut() {
                slot.texture = desired.diffuse_texture;
            }
            if let Some(slot) = set.normal_map.as_mut() {
                slot.normal_map = desired.normal_map;
            }
            if let (Some(slot), Some(power)) = (set.specular.as_mut(), desired.specular_power) {
                slot.power = power;
                slot.color_map = desired.specular_color_map;
                slot.color = desired.specular_color;
            }
            if let (Some(slot), Some(color)) = (set.diffuse_color.as_mut(), desired.diffuse_color) {
                slot.diffuse = color;
            }
        }

        self.parameters = Some(Rc::clone(&parameters));
        self.parameters_effect = Some(effect.id());
        self.applied = desired;
        parameters
    }
}

/// Renders a model asset through the surface effects, reusing per-mesh
/// render state between frames
pub struct ModelRenderComponent {
    config: ModelComponentConfig,
    pub enabled: bool,
    model_asset: Option<AssetReference<ModelAsset>>,
    model: Option<Model>,
    retired: Vec<Model>,
    effect: Option<AssetReference<Effect>>,
    uber_effect: Option<AssetReference<UberEffect>>,
    override_material: Option<Rc<Material>>,
    override_material_factory: Option<MaterialFactory>,
    default_material: Rc<Material>,
    animation: Option<Rc<Animation>>,
    last_animation: Option<Rc<Animation>>,
    animation_clock: f64,
    posed_at: Option<f64>,
    last_world: Option<Mat4>,
    meshes: Vec<MeshRenderCache>,
}

impl Default for ModelRenderComponent {
    fn default() -> Self {
        Self::new(ModelComponentConfig::default())
    }
}

impl ModelRenderComponent {
    pub fn new(config: ModelComponentConfig) -> Self {
        Self {
            config,
            enabled: true,
            model_asset: None,
            model: None,
            retired: Vec::new(),
            effect: None,
            uber_effect: None,
            override_material: None,
            override_material_factory: None,
            default_material: Rc::new(Material::default()),
            animation: None,
            last_animation: None,
            animation_clock: 0.0,
            posed_at: None,
            last_world: None,
            meshes: Vec::new(),
        }
    }

    pub fn config(&self) -> &ModelComponentConfig {
        &self.config
    }

    pub fn model_asset(&self) -> Option<&AssetReference<ModelAsset>> {
        self.model_asset.as_ref()
    }

    /// Swap the model; the current instance is released on the next render
    pub fn set_model(&mut self, model: Option<AssetReference<ModelAsset>>) {
        let same = match (&self.model_asset, &model) {
            (Some(a), Some(b)) => AssetReference::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        self.model_asset = model;
        if let Some(old) = self.model.take() {
            self.retired.push(old);
        }
        self.meshes.clear();
    }

    /// Instance created from the model asset, once it was ready
    pub fn model_instance(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Use a fixed effect instead of the uber effect variants
    pub fn set_effect(&mut self, effect: Option<AssetReference<Effect>>) {
        self.effect = effect;
        for cache in &mut self.meshes {
            cache.effect = None;
        }
    }

    pub fn set_override_material(&mut self, material: Option<Rc<Material>>) {
        self.override_material = material;
    }

    pub fn override_material(&self) -> Option<&Rc<Material>> {
        self.override_material.as_ref()
    }

    /// Derive the override material from the first mesh's material on the
    /// next render; used only while no override material is set
    pub fn set_override_material_factory(&mut self, factory: Option<MaterialFactory>) {
        self.override_material_factory = factory;
    }

    pub fn set_animation(&mut self, animation: Option<Rc<Animation>>) {
        self.animation = animation;
    }

    pub fn animation(&self) -> Option<&Rc<Animation>> {
        self.animation.as_ref()
    }

    /// Seconds since the current animation started
    pub fn animation_time(&self) -> f64 {
        self.animation_clock
    }

    /// Advance the animation clock
    pub fn advance(&mut self, delta_seconds: f64) {
        self.animation_clock += delta_seconds;
    }

    /// Render request built for a mesh on the last render
    pub fn render_request(&self, mesh_index: usize) -> Option<&Rc<RenderRequest>> {
        self.meshes.get(mesh_index)?.request.as_ref()
    }

    /// Parameter set cached for a mesh
    pub fn parameter_set(&self, mesh_index: usize) -> Option<&SharedParameterSet> {
        self.meshes.get(mesh_index)?.parameters.as_ref()
    }

    /// Effect selected for a mesh
    pub fn mesh_effect(&self, mesh_index: usize) -> Option<&Rc<Effect>> {
        self.meshes.get(mesh_index)?.effect.as_ref()
    }

    /// Queue one request per mesh into `batcher`
    ///
    /// Does nothing while disabled, outside a 3D pass, or until the model
    /// asset is loaded. Meshes whose effect isn't loaded yet are skipped.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        batcher: &mut dyn RenderBatcher,
        assets: &dyn AssetResolver,
        world: Mat4,
    ) -> RenderResult<()> {
        if !self.enabled {
            return Ok(());
        }

        for mut old in self.retired.drain(..) {
            old.dispose(ctx.device_mut());
        }

        if self.model.is_none() {
            if let Some(asset) = self.model_asset.as_ref().and_then(AssetReference::asset) {
                log::debug!("Instantiating model `{}`", asset.name());
                self.model = Some(asset.instantiate());
            }
        }
        if self.model.is_none() || !ctx.is_3d_pass() {
            return Ok(());
        }

        if self.effect.is_none() && self.uber_effect.is_none() {
            self.uber_effect = Some(assets.uber_effect(&self.config.uber_effect));
        }

        let mut frame_reasons = Vec::new();
        if self.last_world != Some(world) {
            frame_reasons.push("matrix");
        }
        self.update_animation(&mut frame_reasons);

        let Some(model) = self.model.as_mut() else {
            return Ok(());
        };
        if let Some(animation) = &self.last_animation {
            model.apply_animation(Rc::clone(animation), self.animation_clock);
        }
        let pose = model.pose().cloned();

        if self.meshes.len() != model.meshes().len() {
            self.meshes.clear();
            self.meshes
                .resize_with(model.meshes().len(), MeshRenderCache::default);
        }

        for (index, mesh) in model.meshes_mut().iter_mut().enumerate() {
            if self.override_material.is_none() {
                if let Some(factory) = &self.override_material_factory {
                    self.override_material = Some(factory(mesh.material()));
                }
            }
            let material = self
                .override_material
                .clone()
                .or_else(|| mesh.material().cloned())
                .unwrap_or_else(|| Rc::clone(&self.default_material));

            let cache = &mut self.meshes[index];
            let mut reasons = frame_reasons.clone();
            cache.update_inputs(mesh, &material, assets, &mut reasons);

            let Some(effect) = select_effect(
                cache,
                self.effect.as_ref(),
                self.uber_effect.as_ref(),
                &self.config.skinned_suffix,
                &mut reasons,
            )?
            else {
                continue;
            };
            let parameters = cache.parameter_set(&effect, &mut reasons);

            if reasons.is_empty() && cache.request.is_some() {
                continue;
            }
            log::debug!(
                "Rebuilding render request for mesh {} of `{}`: {}",
                index,
                model_name(&self.model_asset),
                reasons.join(":")
            );
            let request =
                mesh.create_render_request(ctx, &effect, &parameters, world, pose.as_ref())?;
            cache.request = Some(Rc::new(request));
        }

        self.last_world = Some(world);
        for request in self.meshes.iter().filter_map(|cache| cache.request.as_ref()) {
            batcher.queue_request(ctx, Rc::clone(request));
        }
        Ok(())
    }

    fn update_animation(&mut self, reasons: &mut Vec<&'static str>) {
        let same = match (&self.animation, &self.last_animation) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same {
            reasons.push("animation");
            self.last_animation = self.animation.clone();
            self.animation_clock = 0.0;
            self.posed_at = None;
        }
        if self.last_animation.is_some() && self.posed_at != Some(self.animation_clock) {
            reasons.push("pose");
            self.posed_at = Some(self.animation_clock);
        }
    }

    /// Release the model instance's GPU buffers
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        for mut old in self.retired.drain(..) {
            old.dispose(ctx.device_mut());
        }
        if let Some(model) = self.model.as_mut() {
            model.dispose(ctx.device_mut());
        }
        self.model = None;
        self.meshes.clear();
    }
}

fn model_name(asset: &Option<AssetReference<ModelAsset>>) -> &str {
    asset.as_ref().map_or("", AssetReference::name)
}

/// The cached effect, or a newly selected one; `None` while the effect
/// asset is loading
fn select_effect(
    cache: &mut MeshRenderCache,
    explicit: Option<&AssetReference<Effect>>,
    uber: Option<&AssetReference<UberEffect>>,
    skinned_suffix: &str,
    reasons: &mut Vec<&'static str>,
) -> RenderResult<Option<Rc<Effect>>> {
    if let Some(effect) = &cache.effect {
        return Ok(Some(Rc::clone(effect)));
    }

    let effect = match explicit {
        Some(reference) => reference.asset(),
        None => match uber.and_then(AssetReference::asset) {
            Some(uber) => {
                let name = cache.variant_name(skinned_suffix);
                Some(
                    uber.get(&name)
                        .ok_or(RenderError::UnknownDefaultEffect { name })?,
                )
            }
            None => None,
        },
    };

    if let Some(effect) = &effect {
        reasons.push("effect");
        cache.effect = Some(Rc::clone(effect));
    }
    Ok(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::backend::{RecordingDevice, VertexSemantic};
    use crate::batcher::DefaultRenderBatcher;
    use crate::context::RenderPassKind;
    use crate::effect::EffectSemantic;
    use crate::model::mapping::VertexMappingRegistry;
    use crate::model::{ModelBone, ModelVertex};
    use crate::resources::MaterialTexture;
    use glam::Vec3;
    use rstest::rstest;

    const MODEL: &str = "model.Crate";

    fn surface(name: &str) -> Effect {
        Effect::new(name)
            .with_vertex_inputs(&[VertexSemantic::Position, VertexSemantic::Normal])
            .with_semantic(EffectSemantic::Texture)
            .with_semantic(EffectSemantic::NormalMap)
            .with_semantic(EffectSemantic::Specular)
            .with_semantic(EffectSemantic::ColorDiffuse)
            .with_parameters(&["World"])
    }

    fn uber() -> UberEffect {
        [
            "Texture",
            "TextureNormal",
            "TextureNormalSpecColMap",
            "TextureNormalSpecColCon",
            "TextureNormalSpecColDef",
            "Color",
            "Diffuse",
        ]
        .into_iter()
        .fold(UberEffect::new(), |uber, name| uber.with_effect(name, surface(name)))
    }

    fn triangle(material: Option<Material>) -> ModelMesh {
        let vertex = |x: f32, y: f32| ModelVertex {
            position: Some(Vec3::new(x, y, 0.0)),
            normal: Some(Vec3::Z),
            ..ModelVertex::default()
        };
        ModelMesh::new(
            Rc::new(VertexMappingRegistry::with_defaults()),
            material.map(Rc::new),
            vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
            vec![0, 1, 2],
        )
    }

    fn model_asset(material: Option<Material>) -> ModelAsset {
        ModelAsset::new(Model::new(
            "crate",
            Default::default(),
            vec![triangle(material)],
            None,
        ))
    }

    fn setup(material: Option<Material>) -> (MemoryAssets, ModelRenderComponent, RenderContext) {
        let assets = MemoryAssets::new();
        assets.insert_uber_effect("effect.BuiltinSurface", uber());
        let model = assets.insert_model(MODEL, model_asset(material));
        let mut component = ModelRenderComponent::default();
        component.set_model(Some(model));
        (assets, component, RenderContext::new(RecordingDevice::new(64, 64)))
    }

    fn render(
        component: &mut ModelRenderComponent,
        ctx: &mut RenderContext,
        assets: &MemoryAssets,
        world: Mat4,
    ) -> DefaultRenderBatcher {
        let mut batcher = DefaultRenderBatcher::default();
        component.render(ctx, &mut batcher, assets, world).unwrap();
        batcher
    }

    #[test]
    fn unchanged_inputs_reuse_request_and_parameters() {
        let (assets, mut component, mut ctx) = setup(Some(Material::flat(Color::rgb(10, 20, 30))));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let request = Rc::clone(component.render_request(0).unwrap());
        let parameters = Rc::clone(component.parameter_set(0).unwrap());

        let batcher = render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);

        assert!(Rc::ptr_eq(&request, component.render_request(0).unwrap()));
        assert!(Rc::ptr_eq(&parameters, component.parameter_set(0).unwrap()));
        assert_eq!(batcher.queued().len(), 1);
        assert!(Rc::ptr_eq(&request, &batcher.queued()[0]));
    }

    #[test]
    fn transform_change_rebuilds_request_only() {
        let (assets, mut component, mut ctx) = setup(Some(Material::flat(Color::WHITE)));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let request = Rc::clone(component.render_request(0).unwrap());
        let parameters = Rc::clone(component.parameter_set(0).unwrap());

        let moved = Mat4::from_translation(Vec3::X);
        render(&mut component, &mut ctx, &assets, moved);

        let rebuilt = component.render_request(0).unwrap();
        assert!(!Rc::ptr_eq(&request, rebuilt));
        assert_eq!(rebuilt.world, moved);
        assert!(Rc::ptr_eq(&parameters, component.parameter_set(0).unwrap()));
    }

    #[test]
    fn material_change_rebuilds_parameters_and_effect() {
        let (assets, mut component, mut ctx) = setup(Some(Material::flat(Color::WHITE)));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let parameters = Rc::clone(component.parameter_set(0).unwrap());
        assert_eq!(component.mesh_effect(0).unwrap().name(), "Diffuse");

        component.set_override_material(Some(Rc::new(Material::new("plain"))));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);

        assert!(!Rc::ptr_eq(&parameters, component.parameter_set(0).unwrap()));
        assert_eq!(component.mesh_effect(0).unwrap().name(), "Color");
    }

    #[test]
    fn diffuse_color_defaults_to_black() {
        let (assets, mut component, mut ctx) = setup(None);
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let set = component.parameter_set(0).unwrap().borrow();
        assert_eq!(set.diffuse_color.as_ref().unwrap().diffuse, Color::BLACK);
    }

    #[test]
    fn texture_binding_waits_for_asset() {
        let material = Material::textured("skin/diffuse.png");
        let (assets, mut component, mut ctx) = setup(Some(material));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let first = Rc::clone(component.parameter_set(0).unwrap());
        assert_eq!(first.borrow().texture.as_ref().unwrap().texture, None);

        assets.insert_texture(
            "texture.skin.diffuse",
            TextureAsset::new("diffuse", TextureHandle(42), 8, 8),
        );
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);

        let second = component.parameter_set(0).unwrap();
        assert!(!Rc::ptr_eq(&first, second));
        assert_eq!(
            second.borrow().texture.as_ref().unwrap().texture,
            Some(TextureHandle(42))
        );
    }

    #[rstest]
    #[case::texture_only(Material::textured("a.png"), "Texture")]
    #[case::normal(
        Material::textured("a.png").with_normal_map(MaterialTexture::from_hint_path("n.png")),
        "TextureNormal"
    )]
    #[case::specular_map(
        Material::textured("a.png")
            .with_normal_map(MaterialTexture::from_hint_path("n.png"))
            .with_specular_map(MaterialTexture::from_hint_path("s.png"))
            .with_specular(8.0, None),
        "TextureNormalSpecColMap"
    )]
    #[case::specular_constant(
        Material::textured("a.png")
            .with_normal_map(MaterialTexture::from_hint_path("n.png"))
            .with_specular(8.0, Some(Color::WHITE)),
        "TextureNormalSpecColCon"
    )]
    #[case::specular_default(
        Material::textured("a.png")
            .with_normal_map(MaterialTexture::from_hint_path("n.png"))
            .with_specular(8.0, None),
        "TextureNormalSpecColDef"
    )]
    #[case::diffuse(Material::flat(Color::WHITE), "Diffuse")]
    #[case::vertex_color(Material::new("bare"), "Color")]
    fn variant_follows_material(#[case] material: Material, #[case] expected: &str) {
        let (assets, mut component, mut ctx) = setup(Some(material));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert_eq!(component.mesh_effect(0).unwrap().name(), expected);
    }

    #[test]
    fn meshes_with_a_skeleton_use_skinned_variants() {
        let assets = MemoryAssets::new();
        assets.insert_uber_effect(
            "effect.BuiltinSurface",
            uber().with_effect("ColorSkinned", surface("ColorSkinned")),
        );
        let model = assets.insert_model(
            MODEL,
            ModelAsset::new(Model::new(
                "rigged",
                Default::default(),
                vec![triangle(None)],
                Some(ModelBone::new(0, "root")),
            )),
        );
        let mut component = ModelRenderComponent::default();
        component.set_model(Some(model));
        let mut ctx = RenderContext::new(RecordingDevice::new(64, 64));

        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert_eq!(component.mesh_effect(0).unwrap().name(), "ColorSkinned");
    }

    #[test]
    fn missing_variant_is_an_error() {
        let assets = MemoryAssets::new();
        assets.insert_uber_effect("effect.BuiltinSurface", UberEffect::new());
        let model = assets.insert_model(MODEL, model_asset(None));
        let mut component = ModelRenderComponent::default();
        component.set_model(Some(model));
        let mut ctx = RenderContext::new(RecordingDevice::new(64, 64));
        let mut batcher = DefaultRenderBatcher::default();

        let result = component.render(&mut ctx, &mut batcher, &assets, Mat4::IDENTITY);
        assert!(matches!(
            result,
            Err(RenderError::UnknownDefaultEffect { name }) if name == "Color"
        ));
    }

    #[test]
    fn waits_for_model_and_effects() {
        let assets = MemoryAssets::new();
        let mut component = ModelRenderComponent::default();
        component.set_model(Some(assets.model(MODEL)));
        let mut ctx = RenderContext::new(RecordingDevice::new(64, 64));

        let batcher = render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert!(component.model_instance().is_none());
        assert!(batcher.queued().is_empty());

        assets.insert_model(MODEL, model_asset(None));
        let batcher = render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert!(component.model_instance().is_some());
        assert!(batcher.queued().is_empty());

        assets.insert_uber_effect("effect.BuiltinSurface", uber());
        let batcher = render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert_eq!(batcher.queued().len(), 1);
    }

    #[test]
    fn skips_disabled_and_non_3d_passes() {
        let (assets, mut component, mut ctx) = setup(None);
        component.enabled = false;
        assert!(render(&mut component, &mut ctx, &assets, Mat4::IDENTITY)
            .queued()
            .is_empty());

        component.enabled = true;
        ctx.set_render_pass(RenderPassKind::Canvas2D);
        assert!(render(&mut component, &mut ctx, &assets, Mat4::IDENTITY)
            .queued()
            .is_empty());
    }

    #[test]
    fn explicit_effect_overrides_variants() {
        let (assets, mut component, mut ctx) = setup(None);
        component.set_effect(Some(assets.insert_effect("effect.Custom", surface("custom"))));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert_eq!(component.mesh_effect(0).unwrap().name(), "custom");
    }

    #[test]
    fn material_factory_runs_once() {
        let (assets, mut component, mut ctx) = setup(None);
        component.set_override_material_factory(Some(Box::new(|_| {
            Rc::new(Material::flat(Color::rgb(1, 2, 3)))
        })));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let first = Rc::clone(component.override_material().unwrap());
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);

        assert!(Rc::ptr_eq(&first, component.override_material().unwrap()));
        assert_eq!(component.mesh_effect(0).unwrap().name(), "Diffuse");
    }

    #[test]
    fn animation_clock_resets_on_new_animation() {
        let (assets, mut component, mut ctx) = setup(None);
        let walk = Rc::new(Animation::new("walk", 1.0, 10.0));
        component.set_animation(Some(Rc::clone(&walk)));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        component.advance(0.5);
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert_eq!(component.animation_time(), 0.5);
        assert_eq!(
            component.model_instance().unwrap().pose().unwrap().time_seconds,
            0.5
        );

        component.set_animation(Some(Rc::new(Animation::new("run", 1.0, 10.0))));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        assert_eq!(component.animation_time(), 0.0);
    }

    #[test]
    fn swapping_models_releases_old_instance() {
        let (assets, mut component, mut ctx) = setup(None);
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);
        let buffers = ctx.device_as::<RecordingDevice>().unwrap().live_buffer_count();
        assert_eq!(buffers, 2);

        let other = assets.insert_model("model.Other", model_asset(None));
        component.set_model(Some(other));
        render(&mut component, &mut ctx, &assets, Mat4::IDENTITY);

        // old pair freed, new pair created
        assert_eq!(
            ctx.device_as::<RecordingDevice>().unwrap().live_buffer_count(),
            2
        );
        component.dispose(&mut ctx);
        assert_eq!(
            ctx.device_as::<RecordingDevice>().unwrap().live_buffer_count(),
            0
        );
    }

    #[test]
    fn hierarchy_only_mesh_fails_the_render() {
        let registry = Rc::new(VertexMappingRegistry::with_defaults());
        let assets = MemoryAssets::new();
        assets.insert_uber_effect("effect.BuiltinSurface", uber());
        let model = assets.insert_model(
            MODEL,
            ModelAsset::new(Model::new(
                "crate",
                Default::default(),
                vec![
                    triangle(None),
                    ModelMesh::new(registry, None, Vec::new(), Vec::new()),
                ],
                None,
            )),
        );
        let mut component = ModelRenderComponent::default();
        component.set_model(Some(model));
        let mut ctx = RenderContext::new(RecordingDevice::new(64, 64));
        let mut batcher = DefaultRenderBatcher::default();

        let result = component.render(&mut ctx, &mut batcher, &assets, Mat4::IDENTITY);
        assert!(matches!(result, Err(RenderError::EmptyMesh)));
        assert!(batcher.queued().is_empty());
    }
}
