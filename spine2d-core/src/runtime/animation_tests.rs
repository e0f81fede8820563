use std::sync::Arc;

use crate::test_fixtures::{assert_approx, rotate, translate_x, two_bone_data};
use crate::{
    Animation, Error, Event, EventData, EventTimeline, MixBlend, MixDirection, PropertyId,
    Skeleton, Timeline,
};

#[test]
fn duration_defaults_to_the_latest_key() {
    let animation = Animation::from_timelines(
        "walk",
        vec![rotate(1, &[(0.0, 0.0), (0.8, 10.0)]), translate_x(1, &[(0.0, 0.0), (1.25, 5.0)])],
    )
    .expect("valid animation");
    assert_eq!(animation.name(), "walk");
    assert_approx(animation.duration(), 1.25);
    assert_eq!(animation.timelines().len(), 2);

    let empty = Animation::empty("<empty>");
    assert_approx(empty.duration(), 0.0);
    assert!(empty.timelines().is_empty());
}

#[test]
fn invalid_durations_and_keys_are_rejected() {
    for duration in [f32::NAN, -1.0] {
        let result = Animation::new("bad", Vec::new(), duration);
        assert!(
            matches!(result, Err(Error::InvalidAnimation { ref name, .. }) if name == "bad"),
            "{duration}: {result:?}"
        );
    }
    let unsorted = Animation::new("bad", vec![rotate(1, &[(1.0, 0.0), (0.0, 0.0)])], 1.0);
    assert!(matches!(unsorted, Err(Error::InvalidAnimation { .. })));
}

#[test]
fn has_timeline_checks_property_ids() {
    let animation = Animation::from_timelines("a", vec![rotate(1, &[(0.0, 0.0)])]).expect("valid");
    assert!(animation.has_timeline(&[PropertyId::Rotate(1)]));
    assert!(animation.has_timeline(&[PropertyId::X(1), PropertyId::Rotate(1)]));
    assert!(!animation.has_timeline(&[PropertyId::Rotate(0)]));
    assert!(!animation.has_timeline(&[]));
}

#[test]
fn looped_apply_wraps_time_into_the_duration() {
    let animation =
        Animation::from_timelines("spin", vec![rotate(1, &[(0.0, 0.0), (1.0, 90.0)])]).expect("valid");
    let mut skeleton = Skeleton::new(Arc::new(two_bone_data()));

    animation.apply(&mut skeleton, -1.0, 2.5, true, None, 1.0, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 45.0);

    animation.apply(&mut skeleton, -1.0, 2.5, false, None, 1.0, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 90.0);
}

#[test]
fn looped_apply_fires_events_across_the_wrap() {
    let data = Arc::new(EventData::new("footstep"));
    let events = EventTimeline::new(vec![Event::new(0.1, data.clone()), Event::new(0.9, data)]);
    let animation = Animation::new("steps", vec![Timeline::Event(events)], 1.0).expect("valid");
    let mut skeleton = Skeleton::new(Arc::new(two_bone_data()));

    let mut fired = Vec::new();
    animation.apply(
        &mut skeleton,
        1.8,
        2.2,
        true,
        Some(&mut fired),
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    let times = fired.iter().map(|e| e.time).collect::<Vec<_>>();
    assert_eq!(times, vec![0.9, 0.1]);
    assert_eq!(fired[0].name(), "footstep");
}
