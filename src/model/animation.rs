//! Keyframe animations

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};

/// Sparse time-to-value track, sorted by time in ticks
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<T> {
    keys: Vec<(f64, T)>,
}

impl<T: Copy> KeyframeTrack<T> {
    pub fn new(keys: impl IntoIterator<Item = (f64, T)>) -> Self {
        let mut keys: Vec<_> = keys.into_iter().collect();
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    pub fn keys(&self) -> &[(f64, T)] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sample at `tick`, clamping outside the key range
    ///
    /// `blend` interpolates between the two bracketing keys.
    pub fn sample_with(&self, tick: f64, blend: impl Fn(T, T, f32) -> T) -> Option<T> {
        let (first, last) = (self.keys.first()?, self.keys.last()?);
        if tick <= first.0 {
            return Some(first.1);
        }
        if tick >= last.0 {
            return Some(last.1);
        }

        // First key strictly after `tick`; always in 1..len here
        let upper = self.keys.partition_point(|(time, _)| *time <= tick);
        let (t0, v0) = self.keys[upper - 1];
        let (t1, v1) = self.keys[upper];
        let span = t1 - t0;
        if span <= f64::EPSILON {
            return Some(v1);
        }
        Some(blend(v0, v1, ((tick - t0) / span) as f32))
    }
}

impl KeyframeTrack<Vec3> {
    pub fn sample(&self, tick: f64) -> Option<Vec3> {
        self.sample_with(tick, Vec3::lerp)
    }
}

impl KeyframeTrack<Quat> {
    pub fn sample(&self, tick: f64) -> Option<Quat> {
        self.sample_with(tick, Quat::slerp)
    }
}

/// A named animation with per-bone translation, rotation and scale tracks
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub ticks_per_second: f64,
    pub duration_in_ticks: f64,
    pub translation_keys: BTreeMap<String, KeyframeTrack<Vec3>>,
    pub rotation_keys: BTreeMap<String, KeyframeTrack<Quat>>,
    pub scale_keys: BTreeMap<String, KeyframeTrack<Vec3>>,
}

impl Animation {
    pub fn new(name: &str, ticks_per_second: f64, duration_in_ticks: f64) -> Self {
        Self {
            name: name.to_string(),
            ticks_per_second,
            duration_in_ticks,
            translation_keys: BTreeMap::new(),
            rotation_keys: BTreeMap::new(),
            scale_keys: BTreeMap::new(),
        }
    }

    pub fn with_translation(mut self, bone: &str, keys: impl IntoIterator<Item = (f64, Vec3)>) -> Self {
        self.translation_keys
            .insert(bone.to_string(), KeyframeTrack::new(keys));
        self
    }

    pub fn with_rotation(mut self, bone: &str, keys: impl IntoIterator<Item = (f64, Quat)>) -> Self {
        self.rotation_keys
            .insert(bone.to_string(), KeyframeTrack::new(keys));
        self
    }

    pub fn with_scale(mut self, bone: &str, keys: impl IntoIterator<Item = (f64, Vec3)>) -> Self {
        self.scale_keys.insert(bone.to_string(), KeyframeTrack::new(keys));
        self
    }

    /// Convert seconds to ticks
    ///
    /// A non-positive tick rate is read as one tick per second.
    pub fn tick_at(&self, seconds: f64) -> f64 {
        if self.ticks_per_second > 0.0 {
            seconds * self.ticks_per_second
        } else {
            seconds
        }
    }

    pub fn duration_in_seconds(&self) -> f64 {
        if self.ticks_per_second > 0.0 {
            self.duration_in_ticks / self.ticks_per_second
        } else {
            self.duration_in_ticks
        }
    }

    pub fn translation_at(&self, bone: &str, seconds: f64) -> Option<Vec3> {
        self.translation_keys.get(bone)?.sample(self.tick_at(seconds))
    }

    pub fn rotation_at(&self, bone: &str, seconds: f64) -> Option<Quat> {
        self.rotation_keys.get(bone)?.sample(self.tick_at(seconds))
    }

    pub fn scale_at(&self, bone: &str, seconds: f64) -> Option<Vec3> {
        self.scale_keys.get(bone)?.sample(self.tick_at(seconds))
    }

    /// Local transform of a bone; each missing track falls back on its own
    pub fn local_transform(
        &self,
        bone: &str,
        seconds: f64,
        default_translation: Vec3,
        default_rotation: Quat,
        default_scale: Vec3,
    ) -> Mat4 {
        let translation = self.translation_at(bone, seconds).unwrap_or(default_translation);
        let rotation = self.rotation_at(bone, seconds).unwrap_or(default_rotation);
        let scale = self.scale_at(bone, seconds).unwrap_or(default_scale);
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }
}

/// An animation sampled at a point in time
#[derive(Debug, Clone)]
pub struct AnimationPose {
    pub animation: Rc<Animation>,
    pub time_seconds: f64,
}

impl AnimationPose {
    pub fn new(animation: Rc<Animation>, time_seconds: f64) -> Self {
        Self {
            animation,
            time_seconds,
        }
    }
}

/// Animations available on a model, in declaration order
#[derive(Debug, Clone, Default)]
pub struct AnimationCollection {
    animations: Vec<Rc<Animation>>,
}

impl AnimationCollection {
    pub fn new(animations: impl IntoIterator<Item = Animation>) -> Self {
        Self {
            animations: animations.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Rc<Animation>> {
        self.animations.iter().find(|a| a.name == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Animation>> {
        self.animations.iter()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn walk() -> Animation {
        Animation::new("walk", 10.0, 20.0)
            .with_translation("hip", [(0.0, Vec3::ZERO), (20.0, Vec3::new(2.0, 0.0, 0.0))])
            .with_rotation(
                "hip",
                [
                    (0.0, Quat::IDENTITY),
                    (20.0, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
                ],
            )
    }

    #[rstest]
    #[case(-1.0, 0.0)]
    #[case(0.0, 0.0)]
    #[case(0.5, 0.5)]
    #[case(1.0, 1.0)]
    #[case(2.0, 2.0)]
    #[case(5.0, 2.0)]
    fn translation_is_interpolated_and_clamped(#[case] seconds: f64, #[case] expected_x: f32) {
        let x = walk().translation_at("hip", seconds).unwrap().x;
        assert!((x - expected_x).abs() < 1e-5, "{} != {}", x, expected_x);
    }

    #[test]
    fn rotation_is_slerped() {
        let rotation = walk().rotation_at("hip", 1.0).unwrap();
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(rotation.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn missing_tracks_fall_back_independently() {
        let animation = walk();
        let default_scale = Vec3::splat(3.0);
        let local = animation.local_transform(
            "hip",
            2.0,
            Vec3::new(9.0, 9.0, 9.0),
            Quat::IDENTITY,
            default_scale,
        );
        let (scale, _, translation) = local.to_scale_rotation_translation();

        assert!(translation.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
        assert!(scale.abs_diff_eq(default_scale, 1e-5));
        assert!(animation.translation_at("knee", 1.0).is_none());
    }

    #[test]
    fn keys_are_sorted_on_construction() {
        let track = KeyframeTrack::new([(5.0, Vec3::ONE), (1.0, Vec3::ZERO)]);
        assert_eq!(track.keys()[0].0, 1.0);
        assert_eq!(track.sample(3.0), Some(Vec3::splat(0.5)));
    }

    #[test]
    fn collection_finds_by_name() {
        let collection = AnimationCollection::new([walk(), Animation::new("idle", 1.0, 1.0)]);
        assert_eq!(collection.len(), 2);
        assert!(collection.get("idle").is_some());
        assert!(collection.get("run").is_none());
    }
}
