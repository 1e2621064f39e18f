//! Effects and their parameter sets
//!
//! An [`Effect`] is a compiled shader program: it declares the vertex inputs
//! it consumes, the named uniform parameters it accepts, and which optional
//! capabilities ("semantics") its per-draw parameter sets expose. Parameter
//! sets are plain slot records, so capability queries are tag lookups rather
//! than runtime type inspection.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::backend::{Color, TextureHandle, VertexSemantic};
use crate::error::{RenderError, RenderResult};

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an effect instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        Self(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Value bound to a named effect parameter
#[derive(Debug, Clone, PartialEq)]
pub enum EffectParameterValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Matrix(Mat4),
    MatrixArray(Vec<Mat4>),
    Texture(TextureHandle),
}

impl From<f32> for EffectParameterValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec2> for EffectParameterValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value)
    }
}

impl From<Vec3> for EffectParameterValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec4> for EffectParameterValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<Mat4> for EffectParameterValue {
    fn from(value: Mat4) -> Self {
        Self::Matrix(value)
    }
}

impl From<Vec<Mat4>> for EffectParameterValue {
    fn from(value: Vec<Mat4>) -> Self {
        Self::MatrixArray(value)
    }
}

impl From<TextureHandle> for EffectParameterValue {
    fn from(value: TextureHandle) -> Self {
        Self::Texture(value)
    }
}

/// Optional capabilities a parameter set may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectSemantic {
    Texture,
    NormalMap,
    Specular,
    Bones,
    ColorDiffuse,
}

/// A compiled effect
#[derive(Debug)]
pub struct Effect {
    id: EffectId,
    name: String,
    pass_count: usize,
    vertex_inputs: Vec<VertexSemantic>,
    semantics: Vec<EffectSemantic>,
    bone_capacity: usize,
    parameters: RefCell<BTreeMap<String, Option<EffectParameterValue>>>,
}

impl Effect {
    /// Default size of the bones array in skinned effects
    pub const DEFAULT_BONE_CAPACITY: usize = 48;

    pub fn new(name: &str) -> Self {
        Self {
            id: EffectId::next(),
            name: name.to_string(),
            pass_count: 1,
            vertex_inputs: Vec::new(),
            semantics: Vec::new(),
            bone_capacity: 0,
            parameters: RefCell::new(BTreeMap::new()),
        }
    }

    /// Declare the vertex inputs this effect's vertex shader reads
    #[must_use]
    pub fn with_vertex_inputs(mut self, inputs: &[VertexSemantic]) -> Self {
        self.vertex_inputs = inputs.to_vec();
        self
    }

    /// Declare named uniform parameters
    #[must_use]
    pub fn with_parameters(self, names: &[&str]) -> Self {
        {
            let mut parameters = self.parameters.borrow_mut();
            for name in names {
                parameters.insert((*name).to_string(), None);
            }
        }
        self
    }

    /// Declare a capability exposed by parameter sets of this effect
    #[must_use]
    pub fn with_semantic(mut self, semantic: EffectSemantic) -> Self {
        if !self.semantics.contains(&semantic) {
            self.semantics.push(semantic);
        }
        if semantic == EffectSemantic::Bones && self.bone_capacity == 0 {
            self.bone_capacity = Self::DEFAULT_BONE_CAPACITY;
        }
        self
    }

    /// Set the fixed length of the bones array
    #[must_use]
    pub fn with_bone_capacity(mut self, capacity: usize) -> Self {
        self.bone_capacity = capacity;
        self.with_semantic(EffectSemantic::Bones)
    }

    #[must_use]
    pub fn with_pass_count(mut self, passes: usize) -> Self {
        self.pass_count = passes;
        self
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    pub fn vertex_inputs(&self) -> &[VertexSemantic] {
        &self.vertex_inputs
    }

    pub fn requires_input(&self, semantic: VertexSemantic) -> bool {
        self.vertex_inputs.contains(&semantic)
    }

    pub fn semantics(&self) -> &[EffectSemantic] {
        &self.semantics
    }

    pub fn bone_capacity(&self) -> usize {
        self.bone_capacity
    }

    /// Set a declared parameter; unknown names are a hard error
    pub fn set_parameter(
        &self,
        name: &str,
        value: impl Into<EffectParameterValue>,
    ) -> RenderResult<()> {
        let mut parameters = self.parameters.borrow_mut();
        match parameters.get_mut(name) {
            Some(slot) => {
                *slot = Some(value.into());
                Ok(())
            }
            None => Err(RenderError::MissingParameter {
                effect: self.name.clone(),
                parameter: name.to_string(),
            }),
        }
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.borrow().contains_key(name)
    }

    /// Set a parameter only if this effect declares it
    pub fn set_parameter_if_declared(&self, name: &str, value: impl Into<EffectParameterValue>) {
        if let Some(slot) = self.parameters.borrow_mut().get_mut(name) {
            *slot = Some(value.into());
        }
    }

    /// Current value of a parameter, if declared and set
    pub fn parameter(&self, name: &str) -> Option<EffectParameterValue> {
        self.parameters.borrow().get(name).cloned().flatten()
    }

    /// Snapshot of every parameter that currently has a value
    pub fn parameter_values(&self) -> Vec<(String, EffectParameterValue)> {
        self.parameters
            .borrow()
            .iter()
            .filter_map(|(name, value)| value.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Create a fresh per-draw parameter set with this effect's capabilities
    pub fn create_parameter_set(&self) -> SharedParameterSet {
        Rc::new(RefCell::new(EffectParameterSet::for_effect(self)))
    }
}

/// Diffuse texture capability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureSemantic {
    pub texture: Option<TextureHandle>,
}

/// Normal map capability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalMapSemantic {
    pub normal_map: Option<TextureHandle>,
}

/// Specular capability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecularSemantic {
    pub power: f32,
    pub color_map: Option<TextureHandle>,
    pub color: Option<Color>,
}

/// Skinning capability: a fixed-size array of bone matrices
#[derive(Debug, Clone, PartialEq)]
pub struct BonesSemantic {
    pub bones: Vec<Mat4>,
}

impl BonesSemantic {
    pub fn capacity(&self) -> usize {
        self.bones.len()
    }
}

/// Constant diffuse color capability
#[derive(Debug, Clone, PartialEq)]
pub struct ColorDiffuseSemantic {
    pub diffuse: Color,
}

/// Per-draw parameters of an effect, as a record of optional capability slots
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParameterSet {
    effect: EffectId,
    pub texture: Option<TextureSemantic>,
    pub normal_map: Option<NormalMapSemantic>,
    pub specular: Option<SpecularSemantic>,
    pub bones: Option<BonesSemantic>,
    pub diffuse_color: Option<ColorDiffuseSemantic>,
}

/// Parameter sets are shared between the component cache and render requests
pub type SharedParameterSet = Rc<RefCell<EffectParameterSet>>;

impl EffectParameterSet {
    fn for_effect(effect: &Effect) -> Self {
        let has = |semantic| effect.semantics.contains(&semantic);
        Self {
            effect: effect.id,
            texture: has(EffectSemantic::Texture).then(TextureSemantic::default),
            normal_map: has(EffectSemantic::NormalMap).then(NormalMapSemantic::default),
            specular: has(EffectSemantic::Specular).then(SpecularSemantic::default),
            bones: has(EffectSemantic::Bones).then(|| BonesSemantic {
                bones: vec![Mat4::IDENTITY; effect.bone_capacity],
            }),
            diffuse_color: has(EffectSemantic::ColorDiffuse).then(|| ColorDiffuseSemantic {
                diffuse: Color::BLACK,
            }),
        }
    }

    /// Effect this set was created from
    pub fn effect(&self) -> EffectId {
        self.effect
    }

    pub fn has_semantic(&self, semantic: EffectSemantic) -> bool {
        match semantic {
            EffectSemantic::Texture => self.texture.is_some(),
            EffectSemantic::NormalMap => self.normal_map.is_some(),
            EffectSemantic::Specular => self.specular.is_some(),
            EffectSemantic::Bones => self.bones.is_some(),
            EffectSemantic::ColorDiffuse => self.diffuse_color.is_some(),
        }
    }

    /// Copy every populated slot into the effect's named parameters
    ///
    /// Slots map to `Texture`, `NormalMap`, `SpecularPower`,
    /// `SpecularColorMap`, `SpecularColor`, `Bones` and `ColorDiffuse`.
    /// Parameters the effect doesn't declare are skipped.
    pub fn apply_to(&self, effect: &Effect) {
        if let Some(TextureSemantic { texture: Some(texture) }) = &self.texture {
            effect.set_parameter_if_declared("Texture", *texture);
        }
        if let Some(NormalMapSemantic { normal_map: Some(normal_map) }) = &self.normal_map {
            effect.set_parameter_if_declared("NormalMap", *normal_map);
        }
        if let Some(specular) = &self.specular {
            effect.set_parameter_if_declared("SpecularPower", specular.power);
            if let Some(map) = specular.color_map {
                effect.set_parameter_if_declared("SpecularColorMap", map);
            }
            if let Some(color) = specular.color {
                effect.set_parameter_if_declared("SpecularColor", color.to_vec4());
            }
        }
        if let Some(bones) = &self.bones {
            effect.set_parameter_if_declared("Bones", bones.bones.clone());
        }
        if let Some(diffuse) = &self.diffuse_color {
            effect.set_parameter_if_declared("ColorDiffuse", diffuse.diffuse.to_vec4());
        }
    }
}

/// A family of effect variants looked up by name, e.g. `TextureNormalSkinned`
#[derive(Debug, Default)]
pub struct UberEffect {
    effects: BTreeMap<String, Rc<Effect>>,
}

impl UberEffect {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_effect(mut self, name: &str, effect: Effect) -> Self {
        self.effects.insert(name.to_string(), Rc::new(effect));
        self
    }

    pub fn get(&self, name: &str) -> Option<Rc<Effect>> {
        self.effects.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }
}
