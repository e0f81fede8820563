use std::sync::Arc;

use crate::{
    Animation, Attachment, BoneData, BoneTimeline, BoundingBoxAttachment, CurveFrames, SkeletonData,
    SlotData, Timeline,
};

pub(crate) fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

pub(crate) fn bone(index: usize, name: &str, parent: Option<usize>) -> BoneData {
    BoneData::new(index, name, parent)
}

/// `root` at the origin and `child` (length 100) attached at the root's origin.
pub(crate) fn two_bone_data() -> SkeletonData {
    let mut child = bone(1, "child", Some(0));
    child.length = 100.0;
    SkeletonData {
        bones: vec![bone(0, "root", None), child],
        slots: vec![SlotData::new(0, "body", 1)],
        ..SkeletonData::default()
    }
}

/// Keys of `values.len()` linear values each.
pub(crate) fn linear_frames(keys: &[(f32, &[f32])]) -> CurveFrames {
    let value_count = keys.first().map_or(1, |(_, v)| v.len());
    let mut frames = CurveFrames::new(keys.len(), 0, value_count);
    for (i, (time, values)) in keys.iter().enumerate() {
        frames.set_frame(i, *time, values);
    }
    frames
}

pub(crate) fn rotate(bone_index: usize, keys: &[(f32, f32)]) -> Timeline {
    let keys = keys.iter().map(|(t, v)| (*t, std::slice::from_ref(v))).collect::<Vec<_>>();
    Timeline::Rotate(BoneTimeline::new(bone_index, linear_frames(&keys)))
}

pub(crate) fn translate_x(bone_index: usize, keys: &[(f32, f32)]) -> Timeline {
    let keys = keys.iter().map(|(t, v)| (*t, std::slice::from_ref(v))).collect::<Vec<_>>();
    Timeline::TranslateX(BoneTimeline::new(bone_index, linear_frames(&keys)))
}

pub(crate) fn animation(name: &str, timelines: Vec<Timeline>) -> Arc<Animation> {
    Arc::new(Animation::from_timelines(name, timelines).expect("valid animation"))
}

pub(crate) fn with_animations(mut data: SkeletonData, animations: Vec<Arc<Animation>>) -> Arc<SkeletonData> {
    data.animations = animations;
    Arc::new(data)
}

/// Bounding box polygon in bone-local coordinates.
pub(crate) fn bounding_box(name: &str, vertices: Vec<f32>) -> Arc<Attachment> {
    let mut bounding_box = BoundingBoxAttachment::new(name);
    bounding_box.vertex.set_vertices(vertices);
    Arc::new(Attachment::BoundingBox(bounding_box))
}
