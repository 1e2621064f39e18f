//! Mapping generic model vertices onto GPU vertex layouts
//!
//! Different effects read different vertex inputs, so a mesh keeps one GPU
//! buffer per effect. The conversion is described by a [`VertexMapping`]:
//! a [`GpuVertexKind`] tag plus a plain function from [`ModelVertex`] to
//! [`GpuVertex`]. Uploading dispatches on the tag, one `cast_slice` per
//! concrete vertex struct.

use std::fmt;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::backend::{
    BackendResult, BufferHandle, Color, GraphicsDevice, VertexFormat, VertexLayout, VertexSemantic,
};
use crate::effect::Effect;
use crate::error::{RenderError, RenderResult};

use super::vertex::ModelVertex;

/// Position and texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionTexture {
    pub position: Vec3,
    pub uv: Vec2,
}

/// Position and normal
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormal {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Position, normal and packed vertex color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalColor {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: [u8; 4],
}

/// Position, normal and texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalTexture {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Normal-mapped vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalTangentBinormalTexture {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub uv: Vec2,
}

/// Textured vertex with four bone influences
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalTextureBlendable {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub bone_weights: [f32; 4],
    pub bone_indices: [u8; 4],
}

/// Normal-mapped vertex with four bone influences
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionNormalTangentBinormalTextureBlendable {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
    pub uv: Vec2,
    pub bone_weights: [f32; 4],
    pub bone_indices: [u8; 4],
}

/// Tag naming a concrete GPU vertex struct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVertexKind {
    PositionTexture,
    PositionNormal,
    PositionNormalColor,
    PositionNormalTexture,
    PositionNormalTangentBinormalTexture,
    PositionNormalTextureBlendable,
    PositionNormalTangentBinormalTextureBlendable,
}

impl GpuVertexKind {
    pub fn name(&self) -> &'static str {
        match self {
            GpuVertexKind::PositionTexture => "VertexPositionTexture",
            GpuVertexKind::PositionNormal => "VertexPositionNormal",
            GpuVertexKind::PositionNormalColor => "VertexPositionNormalColor",
            GpuVertexKind::PositionNormalTexture => "VertexPositionNormalTexture",
            GpuVertexKind::PositionNormalTangentBinormalTexture => {
                "VertexPositionNormalTangentBinormalTexture"
            }
            GpuVertexKind::PositionNormalTextureBlendable => "VertexPositionNormalTextureBlendable",
            GpuVertexKind::PositionNormalTangentBinormalTextureBlendable => {
                "VertexPositionNormalTangentBinormalTextureBlendable"
            }
        }
    }

    /// Vertex layout matching the struct's field order
    pub fn layout(&self) -> VertexLayout {
        use VertexFormat::*;
        use VertexSemantic::*;

        match self {
            GpuVertexKind::PositionTexture => {
                VertexLayout::packed(&[(Position, Float32x3), (TexCoord0, Float32x2)])
            }
            GpuVertexKind::PositionNormal => {
                VertexLayout::packed(&[(Position, Float32x3), (Normal, Float32x3)])
            }
            GpuVertexKind::PositionNormalColor => VertexLayout::packed(&[
                (Position, Float32x3),
                (Normal, Float32x3),
                (VertexSemantic::Color, Unorm8x4),
            ]),
            GpuVertexKind::PositionNormalTexture => VertexLayout::packed(&[
                (Position, Float32x3),
                (Normal, Float32x3),
                (TexCoord0, Float32x2),
            ]),
            GpuVertexKind::PositionNormalTangentBinormalTexture => VertexLayout::packed(&[
                (Position, Float32x3),
                (Normal, Float32x3),
                (Tangent, Float32x3),
                (Binormal, Float32x3),
                (TexCoord0, Float32x2),
            ]),
            GpuVertexKind::PositionNormalTextureBlendable => VertexLayout::packed(&[
                (Position, Float32x3),
                (Normal, Float32x3),
                (TexCoord0, Float32x2),
                (BlendWeights, Float32x4),
                (BlendIndices, Uint8x4),
            ]),
            GpuVertexKind::PositionNormalTangentBinormalTextureBlendable => VertexLayout::packed(&[
                (Position, Float32x3),
                (Normal, Float32x3),
                (Tangent, Float32x3),
                (Binormal, Float32x3),
                (TexCoord0, Float32x2),
                (BlendWeights, Float32x4),
                (BlendIndices, Uint8x4),
            ]),
        }
    }
}

/// One mapped vertex of any supported kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GpuVertex {
    PositionTexture(VertexPositionTexture),
    PositionNormal(VertexPositionNormal),
    PositionNormalColor(VertexPositionNormalColor),
    PositionNormalTexture(VertexPositionNormalTexture),
    PositionNormalTangentBinormalTexture(VertexPositionNormalTangentBinormalTexture),
    PositionNormalTextureBlendable(VertexPositionNormalTextureBlendable),
    PositionNormalTangentBinormalTextureBlendable(
        VertexPositionNormalTangentBinormalTextureBlendable,
    ),
}

impl GpuVertex {
    pub fn kind(&self) -> GpuVertexKind {
        match self {
            GpuVertex::PositionTexture(_) => GpuVertexKind::PositionTexture,
            GpuVertex::PositionNormal(_) => GpuVertexKind::PositionNormal,
            GpuVertex::PositionNormalColor(_) => GpuVertexKind::PositionNormalColor,
            GpuVertex::PositionNormalTexture(_) => GpuVertexKind::PositionNormalTexture,
            GpuVertex::PositionNormalTangentBinormalTexture(_) => {
                GpuVertexKind::PositionNormalTangentBinormalTexture
            }
            GpuVertex::PositionNormalTextureBlendable(_) => {
                GpuVertexKind::PositionNormalTextureBlendable
            }
            GpuVertex::PositionNormalTangentBinormalTextureBlendable(_) => {
                GpuVertexKind::PositionNormalTangentBinormalTextureBlendable
            }
        }
    }
}

/// A homogeneous array of mapped vertices, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub enum GpuVertexData {
    PositionTexture(Vec<VertexPositionTexture>),
    PositionNormal(Vec<VertexPositionNormal>),
    PositionNormalColor(Vec<VertexPositionNormalColor>),
    PositionNormalTexture(Vec<VertexPositionNormalTexture>),
    PositionNormalTangentBinormalTexture(Vec<VertexPositionNormalTangentBinormalTexture>),
    PositionNormalTextureBlendable(Vec<VertexPositionNormalTextureBlendable>),
    PositionNormalTangentBinormalTextureBlendable(
        Vec<VertexPositionNormalTangentBinormalTextureBlendable>,
    ),
}

impl GpuVertexData {
    pub fn with_capacity(kind: GpuVertexKind, capacity: usize) -> Self {
        match kind {
            GpuVertexKind::PositionTexture => Self::PositionTexture(Vec::with_capacity(capacity)),
            GpuVertexKind::PositionNormal => Self::PositionNormal(Vec::with_capacity(capacity)),
            GpuVertexKind::PositionNormalColor => {
                Self::PositionNormalColor(Vec::with_capacity(capacity))
            }
            GpuVertexKind::PositionNormalTexture => {
                Self::PositionNormalTexture(Vec::with_capacity(capacity))
            }
            GpuVertexKind::PositionNormalTangentBinormalTexture => {
                Self::PositionNormalTangentBinormalTexture(Vec::with_capacity(capacity))
            }
            GpuVertexKind::PositionNormalTextureBlendable => {
                Self::PositionNormalTextureBlendable(Vec::with_capacity(capacity))
            }
            GpuVertexKind::PositionNormalTangentBinormalTextureBlendable => {
                Self::PositionNormalTangentBinormalTextureBlendable(Vec::with_capacity(capacity))
            }
        }
    }

    pub fn kind(&self) -> GpuVertexKind {
        match self {
            Self::PositionTexture(_) => GpuVertexKind::PositionTexture,
            Self::PositionNormal(_) => GpuVertexKind::PositionNormal,
            Self::PositionNormalColor(_) => GpuVertexKind::PositionNormalColor,
            Self::PositionNormalTexture(_) => GpuVertexKind::PositionNormalTexture,
            Self::PositionNormalTangentBinormalTexture(_) => {
                GpuVertexKind::PositionNormalTangentBinormalTexture
            }
            Self::PositionNormalTextureBlendable(_) => GpuVertexKind::PositionNormalTextureBlendable,
            Self::PositionNormalTangentBinormalTextureBlendable(_) => {
                GpuVertexKind::PositionNormalTangentBinormalTextureBlendable
            }
        }
    }

    /// Append a vertex; its kind must match the array's kind
    pub fn push(&mut self, vertex: GpuVertex) -> RenderResult<()> {
        match (self, vertex) {
            (Self::PositionTexture(data), GpuVertex::PositionTexture(v)) => data.push(v),
            (Self::PositionNormal(data), GpuVertex::PositionNormal(v)) => data.push(v),
            (Self::PositionNormalColor(data), GpuVertex::PositionNormalColor(v)) => data.push(v),
            (Self::PositionNormalTexture(data), GpuVertex::PositionNormalTexture(v)) => {
                data.push(v)
            }
            (
                Self::PositionNormalTangentBinormalTexture(data),
                GpuVertex::PositionNormalTangentBinormalTexture(v),
            ) => data.push(v),
            (
                Self::PositionNormalTextureBlendable(data),
                GpuVertex::PositionNormalTextureBlendable(v),
            ) => data.push(v),
            (
                Self::PositionNormalTangentBinormalTextureBlendable(data),
                GpuVertex::PositionNormalTangentBinormalTextureBlendable(v),
            ) => data.push(v),
            (data, vertex) => {
                return Err(RenderError::VertexKindMismatch {
                    expected: data.kind().name(),
                    found: vertex.kind().name(),
                })
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::PositionTexture(data) => data.len(),
            Self::PositionNormal(data) => data.len(),
            Self::PositionNormalColor(data) => data.len(),
            Self::PositionNormalTexture(data) => data.len(),
            Self::PositionNormalTangentBinormalTexture(data) => data.len(),
            Self::PositionNormalTextureBlendable(data) => data.len(),
            Self::PositionNormalTangentBinormalTextureBlendable(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw vertex bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::PositionTexture(data) => bytemuck::cast_slice(data),
            Self::PositionNormal(data) => bytemuck::cast_slice(data),
            Self::PositionNormalColor(data) => bytemuck::cast_slice(data),
            Self::PositionNormalTexture(data) => bytemuck::cast_slice(data),
            Self::PositionNormalTangentBinormalTexture(data) => bytemuck::cast_slice(data),
            Self::PositionNormalTextureBlendable(data) => bytemuck::cast_slice(data),
            Self::PositionNormalTangentBinormalTextureBlendable(data) => bytemuck::cast_slice(data),
        }
    }

    /// Create a device vertex buffer holding this data
    pub fn upload(&self, device: &mut dyn GraphicsDevice) -> BackendResult<BufferHandle> {
        device.create_vertex_buffer(&self.kind().layout(), self.len(), self.as_bytes())
    }
}

fn position(v: &ModelVertex) -> Vec3 {
    v.position.unwrap_or(Vec3::ZERO)
}

fn normal(v: &ModelVertex) -> Vec3 {
    v.normal.unwrap_or(Vec3::ZERO)
}

fn bone_weights(v: &ModelVertex) -> [f32; 4] {
    v.bone_weights.map(|w| w.to_array()).unwrap_or_default()
}

fn map_position_texture(v: &ModelVertex) -> GpuVertex {
    GpuVertex::PositionTexture(VertexPositionTexture {
        position: position(v),
        uv: v.uv0().unwrap_or(Vec2::ZERO),
    })
}

fn map_position_normal(v: &ModelVertex) -> GpuVertex {
    GpuVertex::PositionNormal(VertexPositionNormal {
        position: position(v),
        normal: normal(v),
    })
}

fn map_position_normal_color(v: &ModelVertex) -> GpuVertex {
    let color = v.color0().unwrap_or(Color::WHITE);
    GpuVertex::PositionNormalColor(VertexPositionNormalColor {
        position: position(v),
        normal: normal(v),
        color: [color.r, color.g, color.b, color.a],
    })
}

fn map_position_normal_texture(v: &ModelVertex) -> GpuVertex {
    GpuVertex::PositionNormalTexture(VertexPositionNormalTexture {
        position: position(v),
        normal: normal(v),
        uv: v.uv0().unwrap_or(Vec2::ZERO),
    })
}

fn map_position_normal_tangent_binormal_texture(v: &ModelVertex) -> GpuVertex {
    GpuVertex::PositionNormalTangentBinormalTexture(VertexPositionNormalTangentBinormalTexture {
        position: position(v),
        normal: normal(v),
        tangent: v.tangent.unwrap_or(Vec3::ZERO),
        binormal: v.bitangent.unwrap_or(Vec3::ZERO),
        uv: v.uv0().unwrap_or(Vec2::ZERO),
    })
}

fn map_position_normal_texture_blendable(v: &ModelVertex) -> GpuVertex {
    GpuVertex::PositionNormalTextureBlendable(VertexPositionNormalTextureBlendable {
        position: position(v),
        normal: normal(v),
        uv: v.uv0().unwrap_or(Vec2::ZERO),
        bone_weights: bone_weights(v),
        bone_indices: v.bone_indices.unwrap_or_default(),
    })
}

fn map_position_normal_tangent_binormal_texture_blendable(v: &ModelVertex) -> GpuVertex {
    GpuVertex::PositionNormalTangentBinormalTextureBlendable(
        VertexPositionNormalTangentBinormalTextureBlendable {
            position: position(v),
            normal: normal(v),
            tangent: v.tangent.unwrap_or(Vec3::ZERO),
            binormal: v.bitangent.unwrap_or(Vec3::ZERO),
            uv: v.uv0().unwrap_or(Vec2::ZERO),
            bone_weights: bone_weights(v),
            bone_indices: v.bone_indices.unwrap_or_default(),
        },
    )
}

/// Resolved mapping from model vertices to one GPU vertex kind
#[derive(Clone, Copy)]
pub struct VertexMapping {
    pub kind: GpuVertexKind,
    pub map: fn(&ModelVertex) -> GpuVertex,
}

impl fmt::Debug for VertexMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexMapping").field("kind", &self.kind).finish()
    }
}

impl VertexMapping {
    /// The standard conversion for a kind; missing attributes become zero
    pub fn for_kind(kind: GpuVertexKind) -> Self {
        let map: fn(&ModelVertex) -> GpuVertex = match kind {
            GpuVertexKind::PositionTexture => map_position_texture,
            GpuVertexKind::PositionNormal => map_position_normal,
            GpuVertexKind::PositionNormalColor => map_position_normal_color,
            GpuVertexKind::PositionNormalTexture => map_position_normal_texture,
            GpuVertexKind::PositionNormalTangentBinormalTexture => {
                map_position_normal_tangent_binormal_texture
            }
            GpuVertexKind::PositionNormalTextureBlendable => map_position_normal_texture_blendable,
            GpuVertexKind::PositionNormalTangentBinormalTextureBlendable => {
                map_position_normal_tangent_binormal_texture_blendable
            }
        };
        Self { kind, map }
    }

    pub fn layout(&self) -> VertexLayout {
        self.kind.layout()
    }

    /// Map every vertex into a packed array
    pub fn map_all<'a>(
        &self,
        vertices: impl ExactSizeIterator<Item = &'a ModelVertex>,
    ) -> RenderResult<GpuVertexData> {
        let mut data = GpuVertexData::with_capacity(self.kind, vertices.len());
        for vertex in vertices {
            data.push((self.map)(vertex))?;
        }
        Ok(data)
    }
}

/// Provider that knows how to feed a mesh's vertices to an effect
///
/// Returns `None` when it can't map this combination; the next registered
/// provider is asked instead.
pub trait ModelRenderConfiguration {
    fn vertex_mapping(&self, vertices: &[ModelVertex], effect: &Effect) -> Option<VertexMapping>;
}

/// Mapping providers queried in registration order
#[derive(Clone, Default)]
pub struct VertexMappingRegistry {
    providers: Vec<Rc<dyn ModelRenderConfiguration>>,
}

impl VertexMappingRegistry {
    /// An empty registry; nothing can be mapped until a provider is registered
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`DefaultModelRenderConfiguration`] installed
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DefaultModelRenderConfiguration);
        registry
    }

    pub fn register(&mut self, provider: impl ModelRenderConfiguration + 'static) {
        self.providers.push(Rc::new(provider));
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First non-`None` answer wins
    pub fn resolve(&self, vertices: &[ModelVertex], effect: &Effect) -> Option<VertexMapping> {
        self.providers
            .iter()
            .find_map(|provider| provider.vertex_mapping(vertices, effect))
    }
}

impl fmt::Debug for VertexMappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexMappingRegistry")
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Matches an effect's declared vertex inputs against the attributes the
/// mesh's vertices carry
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultModelRenderConfiguration;

impl ModelRenderConfiguration for DefaultModelRenderConfiguration {
    fn vertex_mapping(&self, vertices: &[ModelVertex], effect: &Effect) -> Option<VertexMapping> {
        let sample = vertices.first()?;
        let wants = |semantic| effect.requires_input(semantic);

        if !wants(VertexSemantic::Position) || sample.position.is_none() {
            return None;
        }

        let skinned = wants(VertexSemantic::BlendIndices) || wants(VertexSemantic::BlendWeights);
        if skinned && !sample.is_skinned() {
            return None;
        }

        let has_normal = sample.normal.is_some();
        let has_uv = sample.uv0().is_some();

        let kind = if wants(VertexSemantic::Tangent) || wants(VertexSemantic::Binormal) {
            if !has_normal || !has_uv || sample.tangent.is_none() || sample.bitangent.is_none() {
                return None;
            }
            if skinned {
                GpuVertexKind::PositionNormalTangentBinormalTextureBlendable
            } else {
                GpuVertexKind::PositionNormalTangentBinormalTexture
            }
        } else if wants(VertexSemantic::TexCoord0) {
            if !has_uv {
                return None;
            }
            match (wants(VertexSemantic::Normal), skinned) {
                (true, _) if !has_normal => return None,
                (true, true) => GpuVertexKind::PositionNormalTextureBlendable,
                (true, false) => GpuVertexKind::PositionNormalTexture,
                (false, false) => GpuVertexKind::PositionTexture,
                (false, true) => return None,
            }
        } else if skinned || !has_normal {
            return None;
        } else if wants(VertexSemantic::Color) {
            if sample.color0().is_none() {
                return None;
            }
            GpuVertexKind::PositionNormalColor
        } else if wants(VertexSemantic::Normal) {
            GpuVertexKind::PositionNormal
        } else {
            return None;
        };

        log::debug!(
            "Mapped vertices for effect `{}` to {}",
            effect.name(),
            kind.name()
        );
        Some(VertexMapping::for_kind(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn textured_vertex() -> ModelVertex {
        ModelVertex::new(Vec3::ONE)
            .with_normal(Vec3::Z)
            .with_uv(Vec2::new(0.25, 0.75))
    }

    fn effect_with(inputs: &[VertexSemantic]) -> Effect {
        Effect::new("test").with_vertex_inputs(inputs)
    }

    #[test]
    fn gpu_structs_are_tightly_packed() {
        assert_eq!(
            std::mem::size_of::<VertexPositionNormalTextureBlendable>() as u32,
            GpuVertexKind::PositionNormalTextureBlendable.layout().stride
        );
        assert_eq!(
            std::mem::size_of::<VertexPositionNormalTangentBinormalTextureBlendable>() as u32,
            GpuVertexKind::PositionNormalTangentBinormalTextureBlendable
                .layout()
                .stride
        );
        assert_eq!(
            std::mem::size_of::<VertexPositionNormalColor>() as u32,
            GpuVertexKind::PositionNormalColor.layout().stride
        );
    }

    #[test]
    fn default_configuration_picks_layout_from_effect_inputs() {
        use VertexSemantic::*;
        let vertices = [textured_vertex()];
        let config = DefaultModelRenderConfiguration;

        let textured = config
            .vertex_mapping(&vertices, &effect_with(&[Position, Normal, TexCoord0]))
            .unwrap();
        assert_eq!(textured.kind, GpuVertexKind::PositionNormalTexture);

        let lit = config
            .vertex_mapping(&vertices, &effect_with(&[Position, Normal]))
            .unwrap();
        assert_eq!(lit.kind, GpuVertexKind::PositionNormal);
    }

    #[test]
    fn skinned_effect_needs_bone_data() {
        use VertexSemantic::*;
        let effect = effect_with(&[Position, Normal, TexCoord0, BlendWeights, BlendIndices]);
        let config = DefaultModelRenderConfiguration;

        assert!(config.vertex_mapping(&[textured_vertex()], &effect).is_none());

        let skinned = textured_vertex().with_bones([0, 1, 0, 0], Vec4::new(0.5, 0.5, 0.0, 0.0));
        let mapping = config.vertex_mapping(&[skinned], &effect).unwrap();
        assert_eq!(mapping.kind, GpuVertexKind::PositionNormalTextureBlendable);
    }

    struct Fixed(GpuVertexKind);

    impl ModelRenderConfiguration for Fixed {
        fn vertex_mapping(&self, _: &[ModelVertex], _: &Effect) -> Option<VertexMapping> {
            Some(VertexMapping::for_kind(self.0))
        }
    }

    struct Never;

    impl ModelRenderConfiguration for Never {
        fn vertex_mapping(&self, _: &[ModelVertex], _: &Effect) -> Option<VertexMapping> {
            None
        }
    }

    #[test]
    fn registry_takes_first_match_in_order() {
        let mut registry = VertexMappingRegistry::new();
        registry.register(Never);
        registry.register(Fixed(GpuVertexKind::PositionTexture));
        registry.register(Fixed(GpuVertexKind::PositionNormal));

        let mapping = registry
            .resolve(&[textured_vertex()], &effect_with(&[]))
            .unwrap();
        assert_eq!(mapping.kind, GpuVertexKind::PositionTexture);
    }

    #[test]
    fn mapped_data_rejects_other_kinds() {
        let mut data = GpuVertexData::with_capacity(GpuVertexKind::PositionNormal, 1);
        let vertex = map_position_texture(&textured_vertex());
        assert!(matches!(
            data.push(vertex),
            Err(RenderError::VertexKindMismatch { .. })
        ));
    }

    #[test]
    fn mapping_writes_expected_bytes() {
        let mapping = VertexMapping::for_kind(GpuVertexKind::PositionTexture);
        let vertices = [textured_vertex()];
        let data = mapping.map_all(vertices.iter()).unwrap();

        let floats: &[f32] = bytemuck::cast_slice(data.as_bytes());
        assert_eq!(floats, &[1.0, 1.0, 1.0, 0.25, 0.75]);
    }
}
