//! Binary model format, version 1
//!
//! Little-endian throughout. Strings carry a 7-bit variable-length byte count
//! followed by UTF-8. The layout is:
//!
//! ```text
//! i32 animation count
//!   string name, f64 ticks per second, f64 duration in ticks
//!   translation, rotation and scale tracks:
//!     u32 bone count, then per bone: string name, u32 key count, (f64 tick, value)*
//! bone tree, recursively:
//!   i32 id, string name, u32 child count, (string key, bone)*,
//!   16 f32 offset, 3 f32 translation, 4 f32 rotation (xyzw), 3 f32 scale
//! i32 vertex count
//!   3 f32 position, 3 f32 normal, 2 f32 uv, 4 f32 bone weights, 4 f32 bone indices
//! i32 index count, i32 indices
//! ```
//!
//! Only the first mesh, its first UV channel and its bone data are stored.
//! Materials, colors and tangents are not part of the format.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::error::{SerializeError, SerializeResult};

use super::animation::{Animation, AnimationCollection, KeyframeTrack};
use super::bone::ModelBone;
use super::mapping::VertexMappingRegistry;
use super::mesh::ModelMesh;
use super::model::Model;
use super::vertex::{pack_bone_indices, unpack_bone_indices, ModelVertex};

/// Reads and writes single-mesh models
#[derive(Debug, Clone)]
pub struct ModelSerializerV1 {
    registry: Rc<VertexMappingRegistry>,
}

impl ModelSerializerV1 {
    /// `registry` is handed to every deserialized mesh
    pub fn new(registry: Rc<VertexMappingRegistry>) -> Self {
        Self { registry }
    }

    pub fn serialize(&self, model: &Model) -> SerializeResult<Vec<u8>> {
        let root = model.root().ok_or(SerializeError::MissingSkeleton)?;
        let mesh = model.meshes().first().ok_or(SerializeError::NoMeshes)?;
        if model.meshes().len() > 1 {
            log::warn!(
                "Model `{}` has {} meshes; only the first is serialized",
                model.name(),
                model.meshes().len()
            );
        }

        let mut writer = ModelWriter::new(Vec::new());
        writer.write_animations(model.animations())?;
        writer.write_bone(root)?;
        writer.write_vertices(mesh.vertices())?;
        writer.write_indices(mesh.indices())?;
        Ok(writer.into_inner())
    }

    pub fn deserialize(&self, name: &str, data: &[u8]) -> SerializeResult<Model> {
        let mut reader = ModelReader::new(Cursor::new(data));
        let animations = reader.read_animations()?;
        let root = reader.read_bone()?;
        let vertices = reader.read_vertices()?;
        let indices = reader.read_indices()?;

        let consumed = reader.into_inner().position() as usize;
        if consumed < data.len() {
            return Err(SerializeError::TrailingBytes(data.len() - consumed));
        }

        log::debug!(
            "Deserialized model `{}`: {} animations, {} bones, {} vertices, {} indices",
            name,
            animations.len(),
            root.count(),
            vertices.len(),
            indices.len()
        );

        let mesh = ModelMesh::new(Rc::clone(&self.registry), None, vertices, indices);
        Ok(Model::new(name, animations, vec![mesh], Some(root)))
    }
}

struct ModelWriter<W: Write> {
    writer: W,
}

impl<W: Write> ModelWriter<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }

    fn into_inner(self) -> W {
        self.writer
    }

    fn write_string(&mut self, value: &str) -> SerializeResult<()> {
        let mut length = value.len() as u32;
        while length >= 0x80 {
            self.writer.write_u8((length as u8) | 0x80)?;
            length >>= 7;
        }
        self.writer.write_u8(length as u8)?;
        self.writer.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_count(&mut self, count: usize) -> SerializeResult<()> {
        let count = i32::try_from(count).map_err(|_| SerializeError::CountOverflow(count))?;
        self.writer.write_i32::<LittleEndian>(count)?;
        Ok(())
    }

    fn write_f32s(&mut self, values: &[f32]) -> SerializeResult<()> {
        for value in values {
            self.writer.write_f32::<LittleEndian>(*value)?;
        }
        Ok(())
    }

    fn write_animations(&mut self, animations: &AnimationCollection) -> SerializeResult<()> {
        self.write_count(animations.len())?;
        for animation in animations.iter() {
            self.write_string(&animation.name)?;
            self.writer.write_f64::<LittleEndian>(animation.ticks_per_second)?;
            self.writer.write_f64::<LittleEndian>(animation.duration_in_ticks)?;
            self.write_tracks(&animation.translation_keys, |v| v.to_array().to_vec())?;
            self.write_tracks(&animation.rotation_keys, |q| q.to_array().to_vec())?;
            self.write_tracks(&animation.scale_keys, |v| v.to_array().to_vec())?;
        }
        Ok(())
    }

    fn write_tracks<T: Copy>(
        &mut self,
        tracks: &BTreeMap<String, KeyframeTrack<T>>,
        components: impl Fn(T) -> Vec<f32>,
    ) -> SerializeResult<()> {
        self.writer.write_u32::<LittleEndian>(tracks.len() as u32)?;
        for (bone, track) in tracks {
            self.write_string(bone)?;
            self.writer.write_u32::<LittleEndian>(track.len() as u32)?;
            for (tick, value) in track.keys() {
                self.writer.write_f64::<LittleEndian>(*tick)?;
                self.write_f32s(&components(*value))?;
            }
        }
        Ok(())
    }

    fn write_bone(&mut self, bone: &ModelBone) -> SerializeResult<()> {
        self.writer.write_i32::<LittleEndian>(bone.id)?;
        self.write_string(&bone.name)?;
        self.writer.write_u32::<LittleEndian>(bone.children.len() as u32)?;
        for (key, child) in &bone.children {
            self.write_string(key)?;
            self.write_bone(child)?;
        }
        self.write_f32s(&bone.bone_offset.to_cols_array())?;
        self.write_f32s(&bone.default_translation.to_array())?;
        self.write_f32s(&bone.default_rotation.to_array())?;
        self.write_f32s(&bone.default_scale.to_array())
    }

    fn write_vertices(&mut self, vertices: &[ModelVertex]) -> SerializeResult<()> {
        self.write_count(vertices.len())?;
        for vertex in vertices {
            self.write_f32s(&vertex.position.unwrap_or(Vec3::ZERO).to_array())?;
            self.write_f32s(&vertex.normal.unwrap_or(Vec3::ZERO).to_array())?;
            self.write_f32s(&vertex.uv0().unwrap_or(Vec2::ZERO).to_array())?;
            self.write_f32s(&vertex.bone_weights.unwrap_or(Vec4::ZERO).to_array())?;
            let indices = vertex.bone_indices.map(unpack_bone_indices).unwrap_or(Vec4::ZERO);
            self.write_f32s(&indices.to_array())?;
        }
        Ok(())
    }

    fn write_indices(&mut self, indices: &[u32]) -> SerializeResult<()> {
        self.write_count(indices.len())?;
        for index in indices {
            let index = i32::try_from(*index).map_err(|_| SerializeError::IndexOverflow(*index))?;
            self.writer.write_i32::<LittleEndian>(index)?;
        }
        Ok(())
    }
}

struct ModelReader<R: Read> {
    reader: R,
}

impl<R: Read> ModelReader<R> {
    fn new(reader: R) -> Self {
        Self { reader }
    }

    fn into_inner(self) -> R {
        self.reader
    }

    fn read_string(&mut self) -> SerializeResult<String> {
        let mut length = 0u32;
        let mut shift = 0;
        loop {
            if shift > 28 {
                return Err(SerializeError::InvalidString(
                    "length prefix longer than five bytes".to_string(),
                ));
            }
            let byte = self.reader.read_u8()?;
            length |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        let mut bytes = Vec::new();
        (&mut self.reader).take(length as u64).read_to_end(&mut bytes)?;
        if bytes.len() != length as usize {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        String::from_utf8(bytes).map_err(|e| SerializeError::InvalidString(e.to_string()))
    }

    fn read_count(&mut self) -> SerializeResult<usize> {
        let count = self.reader.read_i32::<LittleEndian>()?;
        if count < 0 {
            return Err(SerializeError::NegativeCount(count));
        }
        Ok(count as usize)
    }

    fn read_f32s<const N: usize>(&mut self) -> SerializeResult<[f32; N]> {
        let mut values = [0.0; N];
        for value in &mut values {
            *value = self.reader.read_f32::<LittleEndian>()?;
        }
        Ok(values)
    }

    fn read_vec3(&mut self) -> SerializeResult<Vec3> {
        Ok(Vec3::from_array(self.read_f32s()?))
    }

    fn read_quat(&mut self) -> SerializeResult<Quat> {
        Ok(Quat::from_array(self.read_f32s()?))
    }

    fn read_animations(&mut self) -> SerializeResult<AnimationCollection> {
        let count = self.read_count()?;
        let mut animations = Vec::new();
        for _ in 0..count {
            let name = self.read_string()?;
            let ticks_per_second = self.reader.read_f64::<LittleEndian>()?;
            let duration_in_ticks = self.reader.read_f64::<LittleEndian>()?;
            let mut animation = Animation::new(&name, ticks_per_second, duration_in_ticks);
            animation.translation_keys = self.read_tracks(Self::read_vec3)?;
            animation.rotation_keys = self.read_tracks(Self::read_quat)?;
            animation.scale_keys = self.read_tracks(Self::read_vec3)?;
            animations.push(animation);
        }
        Ok(AnimationCollection::new(animations))
    }

    fn read_tracks<T: Copy>(
        &mut self,
        read_value: fn(&mut Self) -> SerializeResult<T>,
    ) -> SerializeResult<BTreeMap<String, KeyframeTrack<T>>> {
        let bones = self.reader.read_u32::<LittleEndian>()?;
        let mut tracks = BTreeMap::new();
        for _ in 0..bones {
            let bone = self.read_string()?;
            let keys = self.reader.read_u32::<LittleEndian>()?;
            let mut track = Vec::new();
            for _ in 0..keys {
                let tick = self.reader.read_f64::<LittleEndian>()?;
                track.push((tick, read_value(self)?));
            }
            tracks.insert(bone, KeyframeTrack::new(track));
        }
        Ok(tracks)
    }

    fn read_bone(&mut self) -> SerializeResult<ModelBone> {
        let id = self.reader.read_i32::<LittleEndian>()?;
        let name = self.read_string()?;
        let mut bone = ModelBone::new(id, &name);

        let children = self.reader.read_u32::<LittleEndian>()?;
        for _ in 0..children {
            let key = self.read_string()?;
            let child = self.read_bone()?;
            bone.children.push((key, child));
        }

        bone.bone_offset = Mat4::from_cols_array(&self.read_f32s()?);
        bone.default_translation = self.read_vec3()?;
        bone.default_rotation = self.read_quat()?;
        bone.default_scale = self.read_vec3()?;
        Ok(bone)
    }

    fn read_vertices(&mut self) -> SerializeResult<Vec<ModelVertex>> {
        let count = self.read_count()?;
        let mut vertices = Vec::new();
        for _ in 0..count {
            let position = self.read_vec3()?;
            let normal = self.read_vec3()?;
            let uv = Vec2::from_array(self.read_f32s()?);
            let weights = Vec4::from_array(self.read_f32s()?);
            let indices = Vec4::from_array(self.read_f32s()?);

            let mut vertex = ModelVertex::new(position).with_normal(normal).with_uv(uv);
            // All-zero bone data is what unskinned vertices are written as
            if weights != Vec4::ZERO || indices != Vec4::ZERO {
                vertex = vertex.with_bones(pack_bone_indices(indices), weights);
            }
            vertices.push(vertex);
        }
        Ok(vertices)
    }

    fn read_indices(&mut self) -> SerializeResult<Vec<u32>> {
        let count = self.read_count()?;
        let mut indices = Vec::new();
        for _ in 0..count {
            let index = self.reader.read_i32::<LittleEndian>()?;
            if index < 0 {
                return Err(SerializeError::NegativeIndex(index));
            }
            indices.push(index as u32);
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Color;
    use crate::resources::Material;
    use std::io::ErrorKind;

    fn serializer() -> ModelSerializerV1 {
        ModelSerializerV1::new(Rc::new(VertexMappingRegistry::with_defaults()))
    }

    fn skinned_model() -> Model {
        let registry = Rc::new(VertexMappingRegistry::with_defaults());
        let vertices = vec![
            ModelVertex::new(Vec3::new(0.0, 1.0, 2.0))
                .with_normal(Vec3::Y)
                .with_uv(Vec2::new(0.25, 0.5))
                .with_uv(Vec2::new(9.0, 9.0))
                .with_color(Color::WHITE)
                .with_bones([0, 1, 0, 0], Vec4::new(0.75, 0.25, 0.0, 0.0)),
            ModelVertex::new(Vec3::X)
                .with_normal(Vec3::Z)
                .with_uv(Vec2::ONE)
                .with_bones([1, 0, 0, 0], Vec4::X),
            ModelVertex::new(Vec3::Z)
                .with_normal(Vec3::Z)
                .with_uv(Vec2::ZERO)
                .with_bones([2, 1, 0, 0], Vec4::new(0.5, 0.5, 0.0, 0.0)),
        ];
        let material = Rc::new(Material::flat(Color::rgb(255, 0, 0)));
        let mesh = ModelMesh::new(registry, Some(material), vertices, vec![0, 1, 2]);

        let root = ModelBone::new(ModelBone::UNBOUND, "Armature")
            .with_child(
                ModelBone::new(0, "hip")
                    .with_offset(Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)))
                    .with_default_transform(Vec3::Y, Quat::from_rotation_x(0.5), Vec3::ONE)
                    .with_child(ModelBone::new(1, "knee"))
                    .with_child(ModelBone::new(2, "ankle")),
            );

        let walk = Animation::new("walk", 24.0, 48.0)
            .with_translation("hip", [(0.0, Vec3::ZERO), (48.0, Vec3::X)])
            .with_rotation("knee", [(12.0, Quat::from_rotation_z(1.0))])
            .with_scale("ankle", [(0.0, Vec3::ONE), (24.0, Vec3::splat(2.0))]);

        Model::new(
            "walker",
            AnimationCollection::new([walk, Animation::new("idle", 0.0, 1.0)]),
            vec![mesh],
            Some(root),
        )
    }

    #[test]
    fn round_trip_keeps_hierarchy_animations_and_geometry() {
        let _ = env_logger::builder().is_test(true).try_init();
        let model = skinned_model();
        let bytes = serializer().serialize(&model).unwrap();
        let decoded = serializer().deserialize("walker", &bytes).unwrap();

        assert_eq!(decoded.root(), model.root());
        assert_eq!(decoded.animations().len(), 2);
        for (a, b) in decoded.animations().iter().zip(model.animations().iter()) {
            assert_eq!(a.as_ref(), b.as_ref());
        }

        let (original, copy) = (&model.meshes()[0], &decoded.meshes()[0]);
        assert_eq!(copy.indices(), original.indices());
        for (a, b) in copy.vertices().iter().zip(original.vertices()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.normal, b.normal);
            assert_eq!(a.uv0(), b.uv0());
            assert_eq!(a.bone_weights, b.bone_weights);
            assert_eq!(a.bone_indices, b.bone_indices);
        }
    }

    #[test]
    fn format_drops_material_and_extra_channels() {
        let bytes = serializer().serialize(&skinned_model()).unwrap();
        let decoded = serializer().deserialize("walker", &bytes).unwrap();

        assert_eq!(decoded.meshes().len(), 1);
        let mesh = &decoded.meshes()[0];
        assert!(mesh.material().is_none());
        assert_eq!(mesh.vertices()[0].tex_coords.len(), 1);
        assert!(mesh.vertices()[0].colors.is_empty());
        assert!(decoded.skeleton().is_some());
    }

    #[test]
    fn strings_use_seven_bit_length_prefix() {
        let mut writer = ModelWriter::new(Vec::new());
        let long = "b".repeat(200);
        writer.write_string("abc").unwrap();
        writer.write_string(&long).unwrap();
        let bytes = writer.into_inner();

        assert_eq!(&bytes[..4], &[3, b'a', b'b', b'c']);
        assert_eq!(&bytes[4..6], &[0xc8, 0x01]);

        let mut reader = ModelReader::new(Cursor::new(bytes.as_slice()));
        assert_eq!(reader.read_string().unwrap(), "abc");
        assert_eq!(reader.read_string().unwrap(), long);
    }

    #[test]
    fn truncated_input_is_an_io_error() {
        let bytes = serializer().serialize(&skinned_model()).unwrap();
        let result = serializer().deserialize("walker", &bytes[..bytes.len() - 3]);
        match result {
            Err(SerializeError::Io(err)) => assert_eq!(err.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected eof, got {:?}", other.map(|m| m.name().to_string())),
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = serializer().serialize(&skinned_model()).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(
            serializer().deserialize("walker", &bytes),
            Err(SerializeError::TrailingBytes(2))
        ));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let bytes = (-1i32).to_le_bytes();
        assert!(matches!(
            serializer().deserialize("broken", &bytes),
            Err(SerializeError::NegativeCount(-1))
        ));
    }

    #[test]
    fn indices_beyond_i32_cannot_be_written() {
        let registry = Rc::new(VertexMappingRegistry::with_defaults());
        let too_large = i32::MAX as u32 + 1;
        let mesh = ModelMesh::new(
            registry,
            None,
            vec![ModelVertex::new(Vec3::ZERO)],
            vec![0, too_large, 0],
        );
        let model = Model::new(
            "huge",
            AnimationCollection::default(),
            vec![mesh],
            Some(ModelBone::new(0, "root")),
        );
        assert!(matches!(
            serializer().serialize(&model),
            Err(SerializeError::IndexOverflow(index)) if index == too_large
        ));
    }

    #[test]
    fn model_without_skeleton_cannot_be_written() {
        let registry = Rc::new(VertexMappingRegistry::with_defaults());
        let mesh = ModelMesh::new(registry, None, vec![ModelVertex::new(Vec3::ZERO)], vec![0]);
        let model = Model::new("static", AnimationCollection::default(), vec![mesh], None);
        assert!(matches!(
            serializer().serialize(&model),
            Err(SerializeError::MissingSkeleton)
        ));
    }
}
