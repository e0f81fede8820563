use std::sync::Arc;

use crate::test_fixtures::{
    animation, assert_approx, bounding_box, rotate, translate_x, two_bone_data, with_animations,
};
use crate::{
    AnimationState, AnimationStateData, AttachmentTimeline, Skeleton, Skin, Timeline,
    TrackEntryHandle,
};

/// `walk` and `raise` both key the child's rotation (90 and 30), `slide` keys its x (40), `punch`
/// swaps the body slot from `torso` to `fist`.
fn setup(mixes: &[(&str, &str, f32)]) -> (AnimationState, Skeleton) {
    let mut data = two_bone_data();
    data.slots[0].attachment_name = Some("torso".to_string());
    let mut skin = Skin::new("default");
    skin.set_attachment(0, "torso", bounding_box("torso", vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0]));
    skin.set_attachment(0, "fist", bounding_box("fist", vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0]));
    data.default_skin = Some(Arc::new(skin));

    let mut punch = AttachmentTimeline::new(0, 1);
    punch.set_frame(0, 0.0, Some("fist"));
    let data = with_animations(
        data,
        vec![
            animation("walk", vec![rotate(1, &[(0.0, 90.0), (1.0, 90.0)])]),
            animation("raise", vec![rotate(1, &[(0.0, 30.0), (1.0, 30.0)])]),
            animation("slide", vec![translate_x(1, &[(0.0, 40.0), (1.0, 40.0)])]),
            animation("punch", vec![Timeline::Attachment(punch)]),
        ],
    );

    let mut state_data = AnimationStateData::new(data.clone());
    for (from, to, duration) in mixes {
        state_data.set_mix(from, to, *duration).expect("mix");
    }
    (AnimationState::new(state_data), Skeleton::new(data))
}

fn step(state: &mut AnimationState, skeleton: &mut Skeleton, delta: f32) {
    state.update(delta);
    state.apply(skeleton);
}

/// Sets and applies `name` so the next entry mixes from it.
fn play(state: &mut AnimationState, skeleton: &mut Skeleton, name: &str) -> TrackEntryHandle {
    let handle = state.set_animation(0, name, true).expect("animation");
    step(state, skeleton, 0.0);
    handle
}

fn body_attachment(skeleton: &Skeleton) -> Option<&str> {
    skeleton.slots[0].attachment().map(|a| a.name())
}

#[test]
fn crossfade_moves_monotonically_toward_the_new_pose() {
    let (mut state, mut skeleton) = setup(&[("walk", "raise", 1.0)]);
    let walk = play(&mut state, &mut skeleton, "walk");
    assert_approx(skeleton.bones[1].rotation, 90.0);

    let raise = state.set_animation(0, "raise", true).expect("raise");
    step(&mut state, &mut skeleton, 0.0);
    assert_approx(skeleton.bones[1].rotation, 90.0);

    step(&mut state, &mut skeleton, 0.5);
    assert_eq!(state.track_entry(raise).and_then(|e| e.mix_percent()), Some(0.5));
    assert_approx(skeleton.bones[1].rotation, 60.0);

    step(&mut state, &mut skeleton, 0.5);
    assert_approx(skeleton.bones[1].rotation, 30.0);
    assert!(walk.is_alive(&state));

    // The first update past the mix duration ends the old entry.
    step(&mut state, &mut skeleton, 0.5);
    assert!(!walk.is_alive(&state));
    assert!(state.track_entry(raise).is_some_and(|e| e.mixing_from().is_none()));
    assert_approx(skeleton.bones[1].rotation, 30.0);
}

#[test]
fn properties_only_the_old_entry_keys_fade_to_the_setup_pose() {
    let (mut state, mut skeleton) = setup(&[("walk", "slide", 0.5)]);
    let walk = play(&mut state, &mut skeleton, "walk");
    state.set_animation(0, "slide", true).expect("slide");

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[1].rotation, 45.0);
    assert_approx(skeleton.bones[1].x, 20.0);

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[1].rotation, 0.0);
    assert_approx(skeleton.bones[1].x, 40.0);

    step(&mut state, &mut skeleton, 0.25);
    assert!(!walk.is_alive(&state));
}

#[test]
fn hold_previous_keeps_the_old_entry_at_full_strength() {
    let (mut state, mut skeleton) = setup(&[("walk", "slide", 0.5)]);
    play(&mut state, &mut skeleton, "walk");
    let slide = state.set_animation(0, "slide", true).expect("slide");
    if let Some(entry) = state.track_entry_mut(slide) {
        entry.hold_previous = true;
    }

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[1].rotation, 90.0);
    assert_approx(skeleton.bones[1].x, 20.0);
}

#[test]
fn interrupting_a_mix_chains_entries_and_keeps_the_reached_percent() {
    let (mut state, mut skeleton) = setup(&[("walk", "raise", 1.0), ("raise", "slide", 0.5)]);
    let walk = play(&mut state, &mut skeleton, "walk");
    let raise = state.set_animation(0, "raise", true).expect("raise");
    step(&mut state, &mut skeleton, 0.25);
    assert_eq!(state.track_entry(raise).and_then(|e| e.mix_percent()), Some(0.25));
    assert_eq!(state.track_entry(walk).and_then(|e| e.mix_percent()), None);

    let slide = state.set_animation(0, "slide", true).expect("slide");
    let entry = state.track_entry(slide).expect("slide entry");
    assert_eq!(entry.mixing_from(), Some(raise));
    assert_approx(entry.mix_duration, 0.5);
    let raise_entry = state.track_entry(raise).expect("raise entry");
    assert_eq!(raise_entry.mixing_from(), Some(walk));
    assert_eq!(raise_entry.mixing_to(), Some(slide));
}

#[test]
fn held_entry_fades_with_the_first_later_entry_that_drops_the_property() {
    let (mut state, mut skeleton) = setup(&[("walk", "raise", 0.5), ("raise", "slide", 0.5)]);
    let walk = play(&mut state, &mut skeleton, "walk");
    let raise = state.set_animation(0, "raise", true).expect("raise");
    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[1].rotation, 60.0);

    // `raise` keys the rotation too, so `walk` stays held until `slide`, which does not, mixes in.
    let slide = state.set_animation(0, "slide", true).expect("slide");
    step(&mut state, &mut skeleton, 0.25);
    // walk at half strength from setup (45), then raise at a quarter toward 30.
    assert_approx(skeleton.bones[1].rotation, 41.25);
    assert_approx(skeleton.bones[1].x, 20.0);

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[1].rotation, 0.0);
    assert_approx(skeleton.bones[1].x, 40.0);
    assert!(walk.is_alive(&state) && raise.is_alive(&state));

    step(&mut state, &mut skeleton, 0.25);
    assert!(!walk.is_alive(&state));
    assert!(!raise.is_alive(&state));
    assert!(state.track_entry(slide).is_some_and(|e| e.mixing_from().is_none()));
}

#[test]
fn attachments_return_to_setup_once_the_entry_mixes_out() {
    let (mut state, mut skeleton) = setup(&[("punch", "slide", 0.5)]);
    assert_eq!(body_attachment(&skeleton), Some("torso"));
    play(&mut state, &mut skeleton, "punch");
    assert_eq!(body_attachment(&skeleton), Some("fist"));

    state.set_animation(0, "slide", true).expect("slide");
    step(&mut state, &mut skeleton, 0.25);
    assert_eq!(body_attachment(&skeleton), Some("torso"));
}

#[test]
fn attachment_threshold_keeps_keys_while_mixing_out() {
    let (mut state, mut skeleton) = setup(&[("punch", "slide", 0.5)]);
    let punch = play(&mut state, &mut skeleton, "punch");
    if let Some(entry) = state.track_entry_mut(punch) {
        entry.attachment_threshold = 1.0;
    }

    state.set_animation(0, "slide", true).expect("slide");
    step(&mut state, &mut skeleton, 0.25);
    assert_eq!(body_attachment(&skeleton), Some("fist"));
}

#[test]
fn upper_tracks_layer_over_lower_ones() {
    let (mut state, mut skeleton) = setup(&[]);
    state.set_animation(0, "walk", true).expect("walk");
    let slide = state.set_animation(1, "slide", true).expect("slide");
    if let Some(entry) = state.track_entry_mut(slide) {
        entry.alpha = 0.5;
    }
    step(&mut state, &mut skeleton, 0.1);
    assert_approx(skeleton.bones[1].rotation, 90.0);
    assert_approx(skeleton.bones[1].x, 20.0);

    let raise = state.set_animation(1, "raise", true).expect("raise");
    if let Some(entry) = state.track_entry_mut(raise) {
        entry.alpha = 0.5;
    }
    step(&mut state, &mut skeleton, 0.1);
    assert_approx(skeleton.bones[1].rotation, 60.0);
}
