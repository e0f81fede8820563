use std::sync::Arc;

use crate::test_fixtures::{assert_approx, linear_frames, rotate, translate_x, two_bone_data};
use crate::{
    Attachment, AttachmentTimeline, BoneTimeline, ConstraintTimeline, DeformTimeline,
    DrawOrderTimeline, Event, EventData, EventTimeline, IkConstraintData, MeshAttachment,
    MixBlend, MixDirection, PropertyId, RegionAttachment, Skeleton, SkeletonData, Skin, SlotData,
    SlotTimeline, Timeline,
};

fn skeleton(data: SkeletonData) -> Skeleton {
    Skeleton::new(Arc::new(data))
}

fn apply(timeline: &Timeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    timeline.apply(skeleton, -1.0, time, None, alpha, blend, MixDirection::In);
}

#[test]
fn rotation_between_keys_takes_the_shorter_arc() {
    let mut skeleton = skeleton(two_bone_data());
    let timeline = rotate(1, &[(0.0, 170.0), (1.0, -170.0)]);

    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Setup);
    assert_approx(skeleton.bones[1].rotation, 180.0);
    apply(&timeline, &mut skeleton, 0.25, 1.0, MixBlend::Setup);
    assert_approx(skeleton.bones[1].rotation, 175.0);
    apply(&timeline, &mut skeleton, 0.75, 1.0, MixBlend::Setup);
    assert_approx(crate::math::wrap_degrees(skeleton.bones[1].rotation), -175.0);
}

#[test]
fn rotation_blends_from_setup_or_current() {
    let mut data = two_bone_data();
    data.bones[1].rotation = 10.0;
    let mut skeleton = skeleton(data);
    let timeline = rotate(1, &[(0.0, 90.0)]);

    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Setup);
    assert_approx(skeleton.bones[1].rotation, 55.0);

    skeleton.bones[1].rotation = 40.0;
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Replace);
    assert_approx(skeleton.bones[1].rotation, 70.0);

    skeleton.bones[1].rotation = 40.0;
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Add);
    assert_approx(skeleton.bones[1].rotation, 85.0);
}

#[test]
fn before_the_first_key_only_setup_and_first_blends_act() {
    let mut skeleton = skeleton(two_bone_data());
    let timeline = rotate(1, &[(0.5, 90.0), (1.0, 0.0)]);

    skeleton.bones[1].rotation = 40.0;
    apply(&timeline, &mut skeleton, 0.1, 0.5, MixBlend::Replace);
    assert_approx(skeleton.bones[1].rotation, 40.0);
    apply(&timeline, &mut skeleton, 0.1, 0.5, MixBlend::First);
    assert_approx(skeleton.bones[1].rotation, 20.0);
    apply(&timeline, &mut skeleton, 0.1, 0.5, MixBlend::Setup);
    assert_approx(skeleton.bones[1].rotation, 0.0);
}

#[test]
fn translation_is_keyed_relative_to_setup() {
    let mut data = two_bone_data();
    data.bones[1].x = 5.0;
    let mut skeleton = skeleton(data);
    let timeline = translate_x(1, &[(0.0, 0.0), (1.0, 20.0)]);

    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Setup);
    assert_approx(skeleton.bones[1].x, 15.0);

    skeleton.bones[1].x = 3.0;
    apply(&timeline, &mut skeleton, 0.5, 0.5, MixBlend::Add);
    assert_approx(skeleton.bones[1].x, 8.0);
}

#[test]
fn scale_is_a_multiple_of_setup_and_mixes_without_collapsing_flips() {
    let mut data = two_bone_data();
    data.bones[1].scale_x = 1.5;
    let mut skeleton = skeleton(data);
    let timeline = Timeline::ScaleX(BoneTimeline::new(1, linear_frames(&[(0.0, &[2.0])])));

    apply(&timeline, &mut skeleton, 0.0, 1.0, MixBlend::Setup);
    assert_approx(skeleton.bones[1].scale_x, 3.0);

    skeleton.bones[1].scale_x = -1.0;
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Replace);
    assert_approx(skeleton.bones[1].scale_x, 2.0);
}

#[test]
fn color_keys_interpolate_each_channel() {
    let mut skeleton = skeleton(two_bone_data());
    let rgba = Timeline::Rgba(SlotTimeline::new(
        0,
        linear_frames(&[(0.0, &[1.0, 1.0, 1.0, 1.0]), (1.0, &[0.0, 0.5, 1.0, 0.0])]),
    ));
    apply(&rgba, &mut skeleton, 0.5, 1.0, MixBlend::Setup);
    let color = skeleton.slots[0].color;
    assert_approx(color.r, 0.5);
    assert_approx(color.g, 0.75);
    assert_approx(color.b, 1.0);
    assert_approx(color.a, 0.5);

    let alpha = Timeline::Alpha(SlotTimeline::new(0, linear_frames(&[(0.0, &[0.2])])));
    apply(&alpha, &mut skeleton, 0.0, 1.0, MixBlend::Replace);
    assert_approx(skeleton.slots[0].color.a, 0.2);
    assert_approx(skeleton.slots[0].color.r, 0.5);
}

fn skinned_data() -> SkeletonData {
    let mut data = two_bone_data();
    data.slots.push(SlotData::new(1, "shadow", 0));
    data.slots[0].attachment_name = Some("a".to_string());
    let mut skin = Skin::new("default");
    for name in ["a", "b"] {
        skin.set_attachment(0, name, Arc::new(Attachment::Region(RegionAttachment::new(name))));
    }
    data.default_skin = Some(Arc::new(skin));
    data
}

fn attachment_name(skeleton: &Skeleton, slot: usize) -> Option<&str> {
    skeleton.slots[slot].attachment().map(|a| a.name())
}

#[test]
fn attachment_keys_switch_instantly() {
    let mut skeleton = skeleton(skinned_data());
    let mut timeline = AttachmentTimeline::new(0, 3);
    timeline.set_frame(0, 0.2, Some("b"));
    timeline.set_frame(1, 0.5, Some("a"));
    timeline.set_frame(2, 1.0, None);
    let timeline = Timeline::Attachment(timeline);

    apply(&timeline, &mut skeleton, 0.3, 0.1, MixBlend::Replace);
    assert_eq!(attachment_name(&skeleton, 0), Some("b"));
    apply(&timeline, &mut skeleton, 0.6, 1.0, MixBlend::Replace);
    assert_eq!(attachment_name(&skeleton, 0), Some("a"));
    apply(&timeline, &mut skeleton, 1.0, 1.0, MixBlend::Replace);
    assert_eq!(attachment_name(&skeleton, 0), None);

    // Before the first key, setup and first blends restore the setup attachment.
    apply(&timeline, &mut skeleton, 0.0, 1.0, MixBlend::Replace);
    assert_eq!(attachment_name(&skeleton, 0), None);
    apply(&timeline, &mut skeleton, 0.0, 1.0, MixBlend::First);
    assert_eq!(attachment_name(&skeleton, 0), Some("a"));
}

#[test]
fn attachment_mixing_out_only_resets_with_setup_blend() {
    let mut skeleton = skeleton(skinned_data());
    let mut timeline = AttachmentTimeline::new(0, 1);
    timeline.set_frame(0, 0.0, Some("b"));
    let timeline = Timeline::Attachment(timeline);
    apply(&timeline, &mut skeleton, 0.0, 1.0, MixBlend::Replace);

    timeline.apply(&mut skeleton, -1.0, 0.5, None, 1.0, MixBlend::Replace, MixDirection::Out);
    assert_eq!(attachment_name(&skeleton, 0), Some("b"));
    timeline.apply(&mut skeleton, -1.0, 0.5, None, 1.0, MixBlend::Setup, MixDirection::Out);
    assert_eq!(attachment_name(&skeleton, 0), Some("a"));
}

#[test]
fn draw_order_keys_reorder_slots() {
    let mut skeleton = skeleton(skinned_data());
    let mut timeline = DrawOrderTimeline::new(3);
    timeline.set_frame(0, 0.0, Some(vec![1, 0]));
    timeline.set_frame(1, 0.5, Some(vec![0]));
    timeline.set_frame(2, 1.0, None);
    let timeline = Timeline::DrawOrder(timeline);

    apply(&timeline, &mut skeleton, 0.2, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![1, 0]);
    // A key that does not cover every slot is skipped.
    apply(&timeline, &mut skeleton, 0.7, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![1, 0]);
    apply(&timeline, &mut skeleton, 1.0, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.draw_order, vec![0, 1]);
}

fn events_at(times: &[f32]) -> EventTimeline {
    let data = Arc::new(EventData::new("step"));
    EventTimeline::new(times.iter().map(|&t| Event::new(t, data.clone())).collect())
}

fn fired(timeline: &EventTimeline, last_time: f32, time: f32) -> Vec<f32> {
    let mut events = Vec::new();
    timeline.fire(last_time, time, &mut events);
    events.iter().map(|e| e.time).collect()
}

#[test]
fn events_fire_after_last_time_up_to_and_including_time() {
    let timeline = events_at(&[0.0, 0.3, 0.7]);
    assert_eq!(fired(&timeline, 0.0, 0.5), vec![0.3]);
    assert_eq!(fired(&timeline, 0.3, 0.7), vec![0.7]);
    assert_eq!(fired(&timeline, -1.0, 0.0), vec![0.0]);
    assert_eq!(fired(&timeline, 0.7, 0.9), Vec::<f32>::new());
    assert_eq!(fired(&timeline, 0.4, 0.6), Vec::<f32>::new());
}

#[test]
fn events_across_a_loop_fire_the_tail_then_the_head() {
    let timeline = events_at(&[0.0, 0.3, 0.7]);
    assert_eq!(fired(&timeline, 0.5, 0.2), vec![0.7, 0.0]);
    assert_eq!(fired(&timeline, 0.8, 0.35), vec![0.0, 0.3]);
}

#[test]
fn events_sharing_a_key_time_all_fire() {
    let timeline = events_at(&[0.3, 0.3, 0.6]);
    assert_eq!(fired(&timeline, 0.1, 0.3), vec![0.3, 0.3]);
    assert_eq!(fired(&timeline, 0.3, 0.6), vec![0.6]);
}

#[test]
fn deform_keys_blend_vertices_of_the_matching_attachment() {
    let mut data = two_bone_data();
    data.slots[0].attachment_name = Some("mesh".to_string());
    let mut mesh = MeshAttachment::new("mesh");
    mesh.vertex.set_vertices(vec![0.0, 0.0, 10.0, 0.0]);
    let id = mesh.vertex.id();
    let mut skin = Skin::new("default");
    skin.set_attachment(0, "mesh", Arc::new(Attachment::Mesh(mesh)));
    data.default_skin = Some(Arc::new(skin));
    let mut skeleton = skeleton(data);

    let mut deform = DeformTimeline::new(0, id, 2, 0);
    deform.set_frame(0, 0.0, vec![0.0, 0.0, 10.0, 0.0]);
    deform.set_frame(1, 1.0, vec![0.0, 0.0, 20.0, 0.0]);
    let timeline = Timeline::Deform(deform);
    timeline.validate().expect("valid deform keys");

    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Replace);
    assert_eq!(skeleton.slots[0].deform.len(), 4);
    assert_approx(skeleton.slots[0].deform[2], 15.0);

    apply(&timeline, &mut skeleton, 1.0, 0.5, MixBlend::Setup);
    assert_approx(skeleton.slots[0].deform[2], 15.0);

    let other = Timeline::Deform(DeformTimeline::new(0, id + 1000, 1, 0));
    skeleton.slots[0].deform.clear();
    apply(&other, &mut skeleton, 0.5, 1.0, MixBlend::Setup);
    assert!(skeleton.slots[0].deform.is_empty());
}

#[test]
fn ik_keys_set_mix_and_flags() {
    let mut data = two_bone_data();
    data.bones.push(crate::test_fixtures::bone(2, "target", Some(0)));
    data.ik_constraints.push(IkConstraintData::new("aim", vec![1], 2));
    let mut skeleton = skeleton(data);
    let timeline = Timeline::IkConstraint(ConstraintTimeline::new(
        0,
        linear_frames(&[(0.0, &[0.0, 4.0, -1.0, 1.0, 0.0]), (1.0, &[1.0, 0.0, -1.0, 1.0, 0.0])]),
    ));
    timeline.validate().expect("five values per key");

    apply(&timeline, &mut skeleton, 0.25, 1.0, MixBlend::Setup);
    let ik = &skeleton.ik_constraints[0];
    assert_approx(ik.mix, 0.25);
    assert_approx(ik.softness, 3.0);
    assert_eq!(ik.bend_direction, -1);
    assert!(ik.compress);
    assert!(!ik.stretch);
}

#[test]
fn property_ids_name_the_values_a_timeline_writes() {
    let translate = Timeline::Translate(BoneTimeline::new(3, linear_frames(&[(0.0, &[0.0, 0.0])])));
    assert_eq!(translate.property_ids(), vec![PropertyId::X(3), PropertyId::Y(3)]);
    let rgba = Timeline::Rgba(SlotTimeline::new(2, linear_frames(&[(0.0, &[1.0; 4])])));
    assert_eq!(rgba.property_ids(), vec![PropertyId::Rgb(2), PropertyId::Alpha(2)]);
    assert_eq!(Timeline::Event(events_at(&[0.0])).property_ids(), vec![PropertyId::Event]);
}

#[test]
fn validate_rejects_malformed_keys() {
    let unsorted = rotate(0, &[(1.0, 0.0), (0.5, 0.0)]);
    assert!(unsorted.validate().is_err());

    let wrong_width = Timeline::Rgba(SlotTimeline::new(0, linear_frames(&[(0.0, &[1.0, 1.0])])));
    assert!(wrong_width.validate().is_err());

    let empty = Timeline::Event(EventTimeline::default());
    assert!(empty.validate().is_err());

    assert!(rotate(0, &[(0.0, 0.0), (2.0, 1.0)]).validate().is_ok());
    assert_approx(rotate(0, &[(0.0, 0.0), (2.0, 1.0)]).duration(), 2.0);
}
