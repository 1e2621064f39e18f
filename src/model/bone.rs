//! Bone hierarchy and skinning matrices
//!
//! [`ModelBone`] is the authored tree. [`Skeleton`] flattens it once, in
//! depth-first pre-order, into an array where every parent precedes its
//! children, so final matrices are computed in a single forward pass.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::error::{RenderError, RenderResult};

use super::animation::AnimationPose;

/// A bone of a model's hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBone {
    /// Slot in the skinning array, or [`ModelBone::UNBOUND`]
    pub id: i32,
    pub name: String,
    /// Children keyed by name, in authored order
    pub children: Vec<(String, ModelBone)>,
    /// Inverse bind pose
    pub bone_offset: Mat4,
    pub default_translation: Vec3,
    pub default_rotation: Quat,
    pub default_scale: Vec3,
}

impl ModelBone {
    /// Bones with this id aren't written to the skinning array
    pub const UNBOUND: i32 = -1;

    pub fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            children: Vec::new(),
            bone_offset: Mat4::IDENTITY,
            default_translation: Vec3::ZERO,
            default_rotation: Quat::IDENTITY,
            default_scale: Vec3::ONE,
        }
    }

    pub fn with_offset(mut self, bone_offset: Mat4) -> Self {
        self.bone_offset = bone_offset;
        self
    }

    pub fn with_default_transform(mut self, translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        self.default_translation = translation;
        self.default_rotation = rotation;
        self.default_scale = scale;
        self
    }

    /// Add a child keyed by its own name
    pub fn with_child(mut self, child: ModelBone) -> Self {
        self.children.push((child.name.clone(), child));
        self
    }

    pub fn child(&self, name: &str) -> Option<&ModelBone> {
        self.children
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, bone)| bone)
    }

    pub fn is_bound(&self) -> bool {
        self.id >= 0
    }

    /// Number of bones in this subtree, this one included
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|(_, c)| c.count()).sum::<usize>()
    }
}

/// A bone of a flattened skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBone {
    pub id: i32,
    pub name: String,
    /// Index of the parent in the flattened array
    pub parent: Option<usize>,
    pub bone_offset: Mat4,
    pub default_translation: Vec3,
    pub default_rotation: Quat,
    pub default_scale: Vec3,
}

impl SkeletonBone {
    /// Local transform under `pose`, or the default pose without one
    pub fn local_transform(&self, pose: Option<&AnimationPose>) -> Mat4 {
        match pose {
            Some(pose) => pose.animation.local_transform(
                &self.name,
                pose.time_seconds,
                self.default_translation,
                self.default_rotation,
                self.default_scale,
            ),
            None => Mat4::from_scale_rotation_translation(
                self.default_scale,
                self.default_rotation,
                self.default_translation,
            ),
        }
    }
}

/// Flattened bone hierarchy shared by all meshes of a model
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<SkeletonBone>,
    by_name: HashMap<String, usize>,
}

impl Skeleton {
    /// Flatten a tree in depth-first pre-order; the root lands at index 0
    pub fn flatten(root: &ModelBone) -> Self {
        let mut bones = Vec::with_capacity(root.count());
        let mut by_name = HashMap::new();
        let mut stack: Vec<(&ModelBone, Option<usize>)> = vec![(root, None)];

        while let Some((bone, parent)) = stack.pop() {
            let index = bones.len();
            by_name.entry(bone.name.clone()).or_insert(index);
            bones.push(SkeletonBone {
                id: bone.id,
                name: bone.name.clone(),
                parent,
                bone_offset: bone.bone_offset,
                default_translation: bone.default_translation,
                default_rotation: bone.default_rotation,
                default_scale: bone.default_scale,
            });

            // Reversed so the first child is visited next
            for (_, child) in bone.children.iter().rev() {
                stack.push((child, Some(index)));
            }
        }

        Self { bones, by_name }
    }

    pub fn bones(&self) -> &[SkeletonBone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn bone(&self, name: &str) -> Option<&SkeletonBone> {
        self.index_of(name).map(|index| &self.bones[index])
    }

    /// Number of bones bound to skinning slots
    pub fn bound_count(&self) -> usize {
        self.bones.iter().filter(|b| b.id >= 0).count()
    }

    /// Final matrix of every bone, indexed like [`Skeleton::bones`]
    ///
    /// `final = parent_final * local * bone_offset`, where `local` comes from
    /// the pose's tracks with per-component fallback to the default pose.
    pub fn final_matrices(&self, pose: Option<&AnimationPose>) -> Vec<Mat4> {
        let mut finals: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let local = bone.local_transform(pose) * bone.bone_offset;
            let matrix = match bone.parent {
                Some(parent) => finals[parent] * local,
                None => local,
            };
            finals.push(matrix);
        }
        finals
    }

    /// Final matrix of the bone with `name`
    pub fn final_matrix(&self, name: &str, pose: Option<&AnimationPose>) -> Option<Mat4> {
        let index = self.index_of(name)?;
        Some(self.final_matrices(pose)[index])
    }

    /// Write final matrices into skinning slots by bone id
    ///
    /// Unbound bones are skipped. Fails if any id is outside `slots`.
    pub fn write_bones(&self, pose: Option<&AnimationPose>, slots: &mut [Mat4]) -> RenderResult<()> {
        let highest = self.bones.iter().map(|b| b.id).max().unwrap_or(ModelBone::UNBOUND);
        if highest >= 0 && highest as usize >= slots.len() {
            return Err(RenderError::TooManyBones {
                bones: highest as usize + 1,
                capacity: slots.len(),
            });
        }

        let finals = self.final_matrices(pose);
        for (bone, matrix) in self.bones.iter().zip(finals) {
            if bone.id < 0 {
                continue;
            }
            slots[bone.id as usize] = matrix;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::animation::Animation;
    use std::rc::Rc;

    /// root(0) -> [spine(1) -> [head(2)], leg(3)]
    fn tree() -> ModelBone {
        ModelBone::new(0, "root")
            .with_default_transform(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE)
            .with_child(
                ModelBone::new(1, "spine")
                    .with_default_transform(
                        Vec3::new(0.0, 2.0, 0.0),
                        Quat::from_rotation_z(0.3),
                        Vec3::splat(2.0),
                    )
                    .with_offset(Mat4::from_translation(Vec3::new(0.0, -3.0, 0.0)))
                    .with_child(ModelBone::new(2, "head")),
            )
            .with_child(ModelBone::new(3, "leg"))
    }

    #[test]
    fn flatten_is_depth_first_pre_order() {
        let skeleton = Skeleton::flatten(&tree());
        let names: Vec<_> = skeleton.bones().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["root", "spine", "head", "leg"]);

        for (index, bone) in skeleton.bones().iter().enumerate() {
            assert_eq!(bone.id as usize, index);
        }
        assert_eq!(skeleton.bones()[2].parent, Some(1));
        assert_eq!(skeleton.bones()[3].parent, Some(0));
        assert_eq!(skeleton.index_of("leg"), Some(3));
    }

    #[test]
    fn final_matrix_composes_offset_local_and_parent() {
        let root = tree();
        let skeleton = Skeleton::flatten(&root);
        let spine = root.child("spine").unwrap();

        let local = |bone: &ModelBone| {
            Mat4::from_scale_rotation_translation(
                bone.default_scale,
                bone.default_rotation,
                bone.default_translation,
            )
        };
        let root_final = local(&root) * root.bone_offset;
        let spine_final = root_final * local(spine) * spine.bone_offset;

        let finals = skeleton.final_matrices(None);
        assert!(finals[0].abs_diff_eq(root_final, 1e-5));
        assert!(finals[1].abs_diff_eq(spine_final, 1e-5));
        assert!(skeleton
            .final_matrix("head", None)
            .unwrap()
            .abs_diff_eq(spine_final * local(spine.child("head").unwrap()), 1e-5));
    }

    #[test]
    fn pose_overrides_only_animated_components() {
        let skeleton = Skeleton::flatten(&tree());
        let animation = Animation::new("lift", 1.0, 1.0)
            .with_translation("root", [(0.0, Vec3::new(5.0, 0.0, 0.0))]);
        let pose = AnimationPose::new(Rc::new(animation), 0.0);

        let finals = skeleton.final_matrices(Some(&pose));
        assert!(finals[0]
            .w_axis
            .truncate()
            .abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn unbound_bones_are_skipped() {
        let root = ModelBone::new(ModelBone::UNBOUND, "armature")
            .with_child(ModelBone::new(0, "a").with_default_transform(
                Vec3::X,
                Quat::IDENTITY,
                Vec3::ONE,
            ));
        let skeleton = Skeleton::flatten(&root);
        let mut slots = [Mat4::ZERO; 2];

        skeleton.write_bones(None, &mut slots).unwrap();

        assert_eq!(slots[0], Mat4::from_translation(Vec3::X));
        assert_eq!(slots[1], Mat4::ZERO);
        assert_eq!(skeleton.bound_count(), 1);
    }

    #[test]
    fn too_many_bones_for_slots() {
        let skeleton = Skeleton::flatten(&tree());
        let mut slots = [Mat4::IDENTITY; 2];
        assert!(matches!(
            skeleton.write_bones(None, &mut slots),
            Err(RenderError::TooManyBones { bones: 4, capacity: 2 })
        ));
    }
}
