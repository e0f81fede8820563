use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::test_fixtures::{animation, assert_approx, rotate, translate_x, two_bone_data, with_animations};
use crate::{
    Animation, AnimationState, AnimationStateData, AnimationStateEvent, AnimationStateListener,
    Error, Event, EventData, EventTimeline, Skeleton, SkeletonData, Timeline, TrackEntrySnapshot,
};

type Log = Rc<RefCell<Vec<String>>>;

/// `walk` holds the child at 90 degrees, `run` slides it along x, `tap` only fires a `step` event
/// halfway through. All last one second.
fn data() -> Arc<SkeletonData> {
    let step = Arc::new(EventData::new("step"));
    let tap = Animation::new(
        "tap",
        vec![Timeline::Event(EventTimeline::new(vec![Event::new(0.5, step)]))],
        1.0,
    )
    .expect("valid tap");
    with_animations(
        two_bone_data(),
        vec![
            animation("walk", vec![rotate(1, &[(0.0, 90.0), (1.0, 90.0)])]),
            animation("run", vec![translate_x(1, &[(0.0, 0.0), (1.0, 20.0)])]),
            Arc::new(tap),
        ],
    )
}

fn setup() -> (AnimationState, Skeleton) {
    let data = data();
    (
        AnimationState::new(AnimationStateData::new(data.clone())),
        Skeleton::new(data),
    )
}

fn label(event: &AnimationStateEvent) -> String {
    match event {
        AnimationStateEvent::Start => "start".to_string(),
        AnimationStateEvent::Interrupt => "interrupt".to_string(),
        AnimationStateEvent::End => "end".to_string(),
        AnimationStateEvent::Dispose => "dispose".to_string(),
        AnimationStateEvent::Complete => "complete".to_string(),
        AnimationStateEvent::Event(e) => format!("event:{}", e.name()),
    }
}

fn recorder(log: &Log, tag: &'static str) -> impl AnimationStateListener + 'static {
    let log = log.clone();
    move |_: &mut AnimationState, entry: &TrackEntrySnapshot, event: &AnimationStateEvent| {
        log.borrow_mut()
            .push(format!("{tag}{} {}", entry.animation_name, label(event)));
    }
}

fn recorded(state: &mut AnimationState) -> Log {
    let log = Log::default();
    state.add_listener(recorder(&log, ""));
    log
}

fn step(state: &mut AnimationState, skeleton: &mut Skeleton, delta: f32, times: usize) {
    for _ in 0..times {
        state.update(delta);
        state.apply(skeleton);
    }
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

#[test]
fn setting_an_animation_on_an_empty_track_starts_it() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);

    let walk = state.set_animation(0, "walk", true).expect("walk");
    assert_eq!(take(&log), ["walk start"]);
    assert_eq!(state.current(0), Some(walk));
    assert_eq!(state.tracks_len(), 1);

    assert!(state.apply(&mut skeleton));
    assert_approx(skeleton.bones[1].rotation, 90.0);
    assert!(state.track_entry(walk).is_some_and(|e| e.was_applied()));
}

#[test]
fn entry_listener_hears_events_before_global_listeners() {
    let (mut state, mut skeleton) = setup();
    let log = Log::default();
    state.add_listener(recorder(&log, "a:"));
    let b = state.add_listener(recorder(&log, "b:"));

    let walk = state.set_animation(0, "walk", true).expect("walk");
    walk.set_listener(&mut state, recorder(&log, "entry:"));
    step(&mut state, &mut skeleton, 0.1, 1);
    take(&log);

    state.set_animation(0, "run", false).expect("run");
    assert_eq!(
        take(&log),
        [
            "entry:walk interrupt",
            "a:walk interrupt",
            "b:walk interrupt",
            "a:run start",
            "b:run start",
        ]
    );

    assert!(state.remove_listener(b));
    assert!(!state.remove_listener(b));
    state.set_animation(0, "walk", false).expect("walk");
    assert!(take(&log).iter().all(|line| line.starts_with("a:")));
}

#[test]
fn replacing_an_applied_entry_mixes_it_out_then_disposes_it() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    let walk = state.set_animation(0, "walk", true).expect("walk");
    step(&mut state, &mut skeleton, 0.1, 1);

    let run = state.set_animation(0, "run", false).expect("run");
    assert_eq!(take(&log), ["walk start", "walk interrupt", "run start"]);
    let entry = state.track_entry(run).expect("run entry");
    assert_eq!(entry.mixing_from(), Some(walk));
    assert_eq!(state.track_entry(walk).and_then(|e| e.mixing_to()), Some(run));

    // A zero mix is applied for one frame, then the old entry ends.
    step(&mut state, &mut skeleton, 0.1, 2);
    assert_eq!(take(&log), ["walk end", "walk dispose"]);
    assert!(!walk.is_alive(&state));
    assert!(state.track_entry(walk).is_none());
    assert!(state.track_entry(run).is_some_and(|e| e.mixing_from().is_none()));
}

#[test]
fn replacing_an_entry_that_was_never_applied_discards_it() {
    let (mut state, _) = setup();
    let log = recorded(&mut state);
    let walk = state.set_animation(0, "walk", true).expect("walk");
    let run = state.set_animation(0, "run", false).expect("run");

    assert_eq!(
        take(&log),
        ["walk start", "walk interrupt", "walk end", "walk dispose", "run start"]
    );
    assert!(!walk.is_alive(&state));
    assert!(state.track_entry(run).is_some_and(|e| e.mixing_from().is_none()));
}

#[test]
fn queued_entry_starts_when_the_previous_one_completes() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    let walk = state.set_animation(0, "walk", false).expect("walk");
    let run = state.add_animation(0, "run", false, 0.0).expect("run");

    assert_eq!(state.queued(0), vec![run]);
    assert_approx(state.track_entry(run).map_or(-1.0, |e| e.delay), 1.0);

    step(&mut state, &mut skeleton, 0.25, 4);
    assert_eq!(take(&log), ["walk start", "walk complete"]);
    assert_eq!(state.current(0), Some(walk));

    step(&mut state, &mut skeleton, 0.25, 1);
    assert_eq!(take(&log), ["walk interrupt", "run start"]);
    assert_eq!(state.current(0), Some(run));
    assert!(state.queued(0).is_empty());
    assert_approx(state.track_entry(run).map_or(-1.0, |e| e.track_time), 0.25);

    step(&mut state, &mut skeleton, 0.25, 1);
    assert_eq!(take(&log), ["walk end", "walk dispose"]);
}

#[test]
fn positive_delay_on_an_empty_track_postpones_the_entry() {
    let (mut state, mut skeleton) = setup();
    let walk = state.add_animation(0, "walk", false, 0.5).expect("walk");
    assert_eq!(state.current(0), Some(walk));
    assert!(!state.apply(&mut skeleton));

    state.update(0.25);
    assert!(!state.apply(&mut skeleton));
    assert_approx(skeleton.bones[1].rotation, 0.0);

    state.update(0.5);
    let entry = state.track_entry(walk).expect("walk entry");
    assert_approx(entry.delay, 0.0);
    assert_approx(entry.track_time, 0.25);
    assert!(state.apply(&mut skeleton));
    assert_approx(skeleton.bones[1].rotation, 90.0);
}

#[test]
fn looped_entries_complete_once_per_loop_between_keyed_events() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    state.set_animation(0, "tap", true).expect("tap");

    step(&mut state, &mut skeleton, 0.25, 8);
    assert_eq!(
        take(&log),
        [
            "tap start",
            "tap event:step",
            "tap complete",
            "tap event:step",
            "tap complete",
        ]
    );
}

#[test]
fn non_looped_entry_completes_once_and_holds_its_last_frame() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    let run = state.set_animation(0, "run", false).expect("run");

    step(&mut state, &mut skeleton, 0.5, 4);
    assert_eq!(take(&log), ["run start", "run complete"]);
    assert_approx(skeleton.bones[1].x, 20.0);
    let entry = state.track_entry(run).expect("run entry");
    assert!(entry.is_complete());
    assert_approx(entry.animation_time(), 1.0);
}

#[test]
fn track_end_clears_the_track() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    let walk = state.set_animation(0, "walk", true).expect("walk");
    if let Some(entry) = state.track_entry_mut(walk) {
        entry.track_end = 0.5;
    }

    step(&mut state, &mut skeleton, 0.25, 3);
    assert_eq!(take(&log), ["walk start", "walk end", "walk dispose"]);
    assert_eq!(state.current(0), None);
}

#[test]
fn listeners_may_change_the_state_while_events_are_delivered() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    state.add_listener(
        |state: &mut AnimationState, entry: &TrackEntrySnapshot, event: &AnimationStateEvent| {
            if entry.animation_name == "walk" && *event == AnimationStateEvent::Complete {
                state.set_animation(0, "run", false).expect("run");
            }
        },
    );

    state.set_animation(0, "walk", false).expect("walk");
    step(&mut state, &mut skeleton, 1.0, 1);
    assert_eq!(
        take(&log),
        ["walk start", "walk complete", "walk interrupt", "run start"]
    );
    let current = state.current(0).and_then(|h| state.track_entry(h));
    assert_eq!(current.map(|e| e.animation().name()), Some("run"));
}

#[test]
fn empty_animation_mixes_out_to_the_setup_pose() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    state.set_animation(0, "walk", true).expect("walk");
    step(&mut state, &mut skeleton, 0.25, 1);
    assert_approx(skeleton.bones[1].rotation, 90.0);

    let empty = state.set_empty_animation(0, 0.5).expect("empty");
    let entry = state.track_entry(empty).expect("empty entry");
    assert!(entry.is_empty_animation());
    assert_eq!(entry.animation().name(), "<empty>");
    assert_approx(entry.mix_duration, 0.5);
    assert_approx(entry.track_end, 0.5);

    step(&mut state, &mut skeleton, 0.25, 1);
    assert_approx(skeleton.bones[1].rotation, 45.0);

    step(&mut state, &mut skeleton, 0.25, 5);
    assert_approx(skeleton.bones[1].rotation, 0.0);
    assert_eq!(
        take(&log),
        [
            "walk start",
            "walk interrupt",
            "<empty> start",
            "walk end",
            "walk dispose",
            "<empty> end",
            "<empty> dispose",
        ]
    );
    assert_eq!(state.current(0), None);
}

#[test]
fn set_empty_animations_covers_every_active_track() {
    let (mut state, mut skeleton) = setup();
    state.set_animation(0, "walk", true).expect("walk");
    state.set_animation(2, "run", true).expect("run");
    step(&mut state, &mut skeleton, 0.1, 1);

    state.set_empty_animations(0.2).expect("empty");
    assert_eq!(state.tracks_len(), 3);
    for track in [0, 2] {
        let current = state.current(track).and_then(|h| state.track_entry(h));
        assert!(current.is_some_and(|e| e.is_empty_animation()), "track {track}");
    }
    assert_eq!(state.current(1), None);
}

#[test]
fn clearing_a_track_ends_current_and_disposes_queued_entries() {
    let (mut state, mut skeleton) = setup();
    let log = recorded(&mut state);
    let walk = state.set_animation(0, "walk", true).expect("walk");
    let run = state.add_animation(0, "run", false, 0.0).expect("run");
    step(&mut state, &mut skeleton, 0.1, 1);
    take(&log);

    state.clear_track(0);
    assert_eq!(take(&log), ["walk end", "walk dispose", "run dispose"]);
    assert_eq!(state.current(0), None);
    assert!(!walk.is_alive(&state));
    assert!(!run.is_alive(&state));
    // The pose is left as it was.
    assert_approx(skeleton.bones[1].rotation, 90.0);
}

#[test]
fn clearing_all_tracks_removes_them() {
    let (mut state, _) = setup();
    let log = recorded(&mut state);
    state.set_animation(0, "walk", true).expect("walk");
    state.set_animation(1, "run", true).expect("run");
    take(&log);

    state.clear_tracks();
    assert_eq!(state.tracks_len(), 0);
    assert_eq!(
        take(&log),
        ["walk end", "walk dispose", "run end", "run dispose"]
    );
}

#[test]
fn time_scales_multiply() {
    let (mut state, _) = setup();
    let walk = state.set_animation(0, "walk", true).expect("walk");
    state.time_scale = 2.0;
    if let Some(entry) = state.track_entry_mut(walk) {
        entry.time_scale = 0.25;
    }
    state.update(1.0);
    assert_approx(state.track_entry(walk).map_or(-1.0, |e| e.track_time), 0.5);
}

#[test]
fn non_finite_delta_is_ignored() {
    let (mut state, _) = setup();
    let walk = state.set_animation(0, "walk", true).expect("walk");
    state.update(f32::NAN);
    state.update(f32::INFINITY);
    assert_approx(state.track_entry(walk).map_or(-1.0, |e| e.track_time), 0.0);
}

#[test]
fn track_complete_accounts_for_loops() {
    let (mut state, _) = setup();
    let walk = state.set_animation(0, "walk", true).expect("walk");
    state.update(1.5);
    let entry = state.track_entry(walk).expect("walk entry");
    assert_approx(entry.track_complete(), 2.0);
    assert_approx(entry.animation_time(), 0.5);

    let run = state.set_animation(1, "run", false).expect("run");
    state.update(1.5);
    let entry = state.track_entry(run).expect("run entry");
    assert_approx(entry.track_complete(), 1.5);
}

#[test]
fn invalid_requests_are_errors() {
    let (mut state, _) = setup();
    let result = state.set_animation(0, "missing", true);
    assert!(matches!(result, Err(Error::UnknownAnimation { ref name }) if name == "missing"));
    assert!(matches!(
        state.add_animation(0, "missing", true, 0.0),
        Err(Error::UnknownAnimation { .. })
    ));
    assert_eq!(state.tracks_len(), 0);

    assert!(matches!(state.set_empty_animation(0, -1.0), Err(Error::InvalidValue { .. })));
    assert!(matches!(
        state.add_empty_animation(0, f32::NAN, 0.0),
        Err(Error::InvalidValue { .. })
    ));
    assert!(matches!(state.set_empty_animations(f32::INFINITY), Err(Error::InvalidValue { .. })));

    let data = state.data_mut();
    assert!(matches!(data.set_mix("walk", "missing", 0.2), Err(Error::UnknownAnimation { .. })));
    assert!(matches!(data.set_mix("walk", "run", -0.2), Err(Error::InvalidValue { .. })));
}

#[test]
fn mix_durations_fall_back_to_the_default() {
    let skeleton_data = data();
    let mut mixes = AnimationStateData::new(skeleton_data.clone());
    mixes.default_mix = 0.1;
    mixes.set_mix("walk", "run", 0.3).expect("mix");

    let walk = skeleton_data.find_animation("walk").expect("walk");
    let run = skeleton_data.find_animation("run").expect("run");
    assert_approx(mixes.mix(walk, run), 0.3);
    assert_approx(mixes.mix(run, walk), 0.1);

    let mut state = AnimationState::new(mixes);
    state.set_animation(0, "walk", true).expect("walk");
    let mut skeleton = Skeleton::new(skeleton_data);
    state.apply(&mut skeleton);
    let next = state.set_animation(0, "run", true).expect("run");
    assert_approx(state.track_entry(next).map_or(-1.0, |e| e.mix_duration), 0.3);
}
