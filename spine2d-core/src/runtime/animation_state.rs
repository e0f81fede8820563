use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::runtime::curve::search1;
use crate::runtime::timeline::{apply_rotate, rotate_value};
use crate::{
    Animation, AttachmentTimeline, BoneTimeline, Error, Event, MixBlend, MixDirection, PropertyId,
    Skeleton, SkeletonData, Timeline, math,
};

const EMPTY_ANIMATION_NAME: &str = "<empty>";

// Slot attachment states, offset from `AnimationState::unkeyed_state`.
const SETUP: u32 = 1;
const CURRENT: u32 = 2;

/// How a timeline of an entry is applied while other entries on the track key the same property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimelineMode {
    /// A lower entry already keyed the property; blend on top of it.
    Subsequent,
    /// First to key the property; mix from the setup pose.
    First,
    /// Like `Subsequent`, but held at full alpha while mixing out.
    HoldSubsequent,
    /// Like `First`, but held at full alpha while mixing out.
    HoldFirst,
    /// Held while the entry it mixes to also keys the property, then faded with the first later
    /// entry that does not.
    HoldMix,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntryId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct EntrySlot {
    generation: u32,
    entry: Option<TrackEntry>,
}

/// Mix durations between pairs of animations, and the shared empty animation.
#[derive(Clone, Debug)]
pub struct AnimationStateData {
    skeleton_data: Arc<SkeletonData>,
    /// Mix duration used when no pair-specific duration is set.
    pub default_mix: f32,
    mixes: HashMap<(String, String), f32>,
    empty_animation: Arc<Animation>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
            empty_animation: Arc::new(Animation::empty(EMPTY_ANIMATION_NAME)),
        }
    }

    pub fn skeleton_data(&self) -> &Arc<SkeletonData> {
        &self.skeleton_data
    }

    pub fn empty_animation(&self) -> &Arc<Animation> {
        &self.empty_animation
    }

    /// Sets the mix duration from one named animation to another.
    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        for name in [from, to] {
            if self.skeleton_data.find_animation(name).is_none() {
                log::debug!("no animation named '{name}' to mix");
                return Err(Error::UnknownAnimation {
                    name: name.to_string(),
                });
            }
        }
        self.set_mix_by_name(from, to, duration)
    }

    /// Sets the mix duration between two animations that need not belong to the skeleton data.
    pub fn set_mix_with(&mut self, from: &Animation, to: &Animation, duration: f32) -> Result<(), Error> {
        self.set_mix_by_name(from.name(), to.name(), duration)
    }

    fn set_mix_by_name(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidValue {
                message: format!("mix duration must be finite and >= 0, got {duration}"),
            });
        }
        self.mixes.insert((from.to_string(), to.to_string()), duration);
        Ok(())
    }

    /// The pair-specific mix duration, or [`AnimationStateData::default_mix`].
    pub fn mix(&self, from: &Animation, to: &Animation) -> f32 {
        self.mixes
            .get(&(from.name().to_string(), to.name().to_string()))
            .copied()
            .unwrap_or(self.default_mix)
    }

    /// Replaces the default mix and adds every pair from `config`.
    #[cfg(feature = "json")]
    pub fn apply_mix_config(&mut self, config: &MixConfig) -> Result<(), Error> {
        if !config.default_mix.is_finite() || config.default_mix < 0.0 {
            return Err(Error::InvalidValue {
                message: format!("default mix must be finite and >= 0, got {}", config.default_mix),
            });
        }
        for mix in &config.mixes {
            self.set_mix(&mix.from, &mix.to, mix.duration)?;
        }
        self.default_mix = config.default_mix;
        Ok(())
    }
}

/// Mix durations as loaded from JSON, e.g.
/// `{ "default_mix": 0.2, "mixes": [{ "from": "walk", "to": "run", "duration": 0.4 }] }`.
#[cfg(feature = "json")]
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MixConfig {
    #[serde(default)]
    pub default_mix: f32,
    #[serde(default)]
    pub mixes: Vec<MixPair>,
}

#[cfg(feature = "json")]
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MixPair {
    pub from: String,
    pub to: String,
    pub duration: f32,
}

#[cfg(feature = "json")]
impl MixConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Playback settings and state for one animation on a track.
///
/// Entries are owned by their [`AnimationState`] and addressed through [`TrackEntryHandle`]; a
/// handle stops resolving once the entry's dispose event has been delivered.
pub struct TrackEntry {
    animation: Arc<Animation>,
    track_index: usize,
    empty: bool,

    /// Repeat the animation. Otherwise the last frame holds once the animation end is passed.
    pub looped: bool,
    /// Apply the entry being mixed from at full alpha instead of fading it out.
    pub hold_previous: bool,
    /// Play the animation backward. Event timelines are skipped.
    pub reverse: bool,
    /// Mix rotations along the shortest arc each frame instead of tracking the mix direction.
    pub shortest_rotation: bool,
    /// Mix percent below which event timelines still fire while mixing out.
    pub event_threshold: f32,
    /// Mix percent below which attachment timelines still apply while mixing out.
    pub attachment_threshold: f32,
    /// Mix percent below which draw order timelines still apply while mixing out.
    pub draw_order_threshold: f32,

    pub animation_start: f32,
    pub animation_end: f32,
    animation_last: f32,
    next_animation_last: f32,

    /// Seconds to wait before the entry starts once it becomes current.
    pub delay: f32,
    pub track_time: f32,
    track_last: f32,
    next_track_last: f32,
    /// Track time at which the track is cleared. Defaults to no end.
    pub track_end: f32,
    pub time_scale: f32,

    pub alpha: f32,
    pub mix_time: f32,
    pub mix_duration: f32,
    interrupt_alpha: f32,
    total_alpha: f32,
    /// Blend for tracks above 0. Track 0 always uses [`MixBlend::First`].
    pub mix_blend: MixBlend,

    mixing_from: Option<EntryId>,
    mixing_to: Option<EntryId>,
    listener: Option<Box<dyn AnimationStateListener>>,

    timeline_mode: Vec<TimelineMode>,
    timeline_hold_mix: Vec<Option<EntryId>>,
    timelines_rotation: Vec<f32>,
}

impl std::fmt::Debug for TrackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEntry")
            .field("track_index", &self.track_index)
            .field("animation", &self.animation.name())
            .field("looped", &self.looped)
            .field("delay", &self.delay)
            .field("track_time", &self.track_time)
            .field("track_end", &self.track_end)
            .field("time_scale", &self.time_scale)
            .field("alpha", &self.alpha)
            .field("mix_time", &self.mix_time)
            .field("mix_duration", &self.mix_duration)
            .field("mixing_from", &self.mixing_from)
            .field("mixing_to", &self.mixing_to)
            .finish_non_exhaustive()
    }
}

impl TrackEntry {
    fn new(
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        mix_duration: f32,
        empty: bool,
    ) -> Self {
        Self {
            track_index,
            empty,
            looped,
            hold_previous: false,
            reverse: false,
            shortest_rotation: false,
            event_threshold: 0.0,
            attachment_threshold: 0.0,
            draw_order_threshold: 0.0,
            animation_start: 0.0,
            animation_end: animation.duration(),
            animation_last: -1.0,
            next_animation_last: -1.0,
            delay: 0.0,
            track_time: 0.0,
            track_last: -1.0,
            next_track_last: -1.0,
            track_end: f32::MAX,
            time_scale: 1.0,
            alpha: 1.0,
            mix_time: 0.0,
            mix_duration,
            interrupt_alpha: 1.0,
            total_alpha: 0.0,
            mix_blend: MixBlend::Replace,
            animation,
            mixing_from: None,
            mixing_to: None,
            listener: None,
            timeline_mode: Vec::new(),
            timeline_hold_mix: Vec::new(),
            timelines_rotation: Vec::new(),
        }
    }

    pub fn animation(&self) -> &Arc<Animation> {
        &self.animation
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn is_empty_animation(&self) -> bool {
        self.empty
    }

    /// Animation time last applied. Event timelines fire keys after this time.
    pub fn animation_last(&self) -> f32 {
        self.animation_last
    }

    pub fn set_animation_last(&mut self, animation_last: f32) {
        self.animation_last = animation_last;
        self.next_animation_last = animation_last;
    }

    /// Track time wrapped or clamped into `animation_start..=animation_end`.
    pub fn animation_time(&self) -> f32 {
        if self.looped {
            let duration = self.animation_end - self.animation_start;
            if duration == 0.0 {
                return self.animation_start;
            }
            return self.track_time % duration + self.animation_start;
        }
        (self.track_time + self.animation_start).min(self.animation_end)
    }

    /// Track time at which the current loop, or the animation, completes.
    pub fn track_complete(&self) -> f32 {
        let duration = self.animation_end - self.animation_start;
        if duration != 0.0 {
            if self.looped {
                return duration * (1.0 + (self.track_time / duration).trunc());
            }
            if self.track_time < duration {
                return duration;
            }
        }
        self.track_time
    }

    pub fn is_complete(&self) -> bool {
        self.track_time >= self.animation_end - self.animation_start
    }

    /// True once the entry has been applied to a skeleton.
    pub fn was_applied(&self) -> bool {
        self.next_track_last != -1.0
    }

    /// Mix percent `mix_time / mix_duration` when mixing, otherwise `None`.
    pub fn mix_percent(&self) -> Option<f32> {
        (self.mixing_from.is_some() && self.mix_duration > 0.0)
            .then(|| (self.mix_time / self.mix_duration).min(1.0))
    }

    pub fn mixing_from(&self) -> Option<TrackEntryHandle> {
        self.mixing_from.map(|id| TrackEntryHandle { id })
    }

    pub fn mixing_to(&self) -> Option<TrackEntryHandle> {
        self.mixing_to.map(|id| TrackEntryHandle { id })
    }

    /// Forgets the rotation mix directions so the next frame picks the shortest arc again.
    pub fn reset_rotation_directions(&mut self) {
        self.timelines_rotation.clear();
    }
}

/// Generational reference to a [`TrackEntry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackEntryHandle {
    id: EntryId,
}

impl TrackEntryHandle {
    /// Sets the entry's own listener, notified before the state's listeners.
    pub fn set_listener<L: AnimationStateListener + 'static>(&self, state: &mut AnimationState, listener: L) {
        if let Some(entry) = state.entry_mut(self.id) {
            entry.listener = Some(Box::new(listener));
        }
    }

    /// False once the entry has been disposed.
    pub fn is_alive(&self, state: &AnimationState) -> bool {
        state.entry(self.id).is_some()
    }
}

/// Identifies a listener added with [`AnimationState::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The entry an event is delivered for, captured when the event is delivered.
#[derive(Clone, Debug)]
pub struct TrackEntrySnapshot {
    pub handle: TrackEntryHandle,
    pub track_index: usize,
    pub animation_name: String,
    pub track_time: f32,
    pub animation_time: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStateEvent {
    /// The entry became current.
    Start,
    /// Another entry replaced this one as current.
    Interrupt,
    /// The entry is no longer current or mixed from.
    End,
    /// The entry is about to be released; its handle stops resolving afterwards.
    Dispose,
    /// A loop, or the whole animation, finished.
    Complete,
    Event(Event),
}

/// Receives track entry lifecycle and keyed events.
///
/// Callbacks may call back into the [`AnimationState`]; events they cause are queued and delivered
/// after the current one.
pub trait AnimationStateListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    );
}

impl<F> AnimationStateListener for F
where
    F: FnMut(&mut AnimationState, &TrackEntrySnapshot, &AnimationStateEvent),
{
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    ) {
        self(state, entry, event);
    }
}

#[derive(Clone, Debug)]
struct QueuedEvent {
    entry: EntryId,
    event: AnimationStateEvent,
}

#[derive(Debug, Default)]
struct Track {
    current: Option<EntryId>,
    queue: VecDeque<EntryId>,
}

/// Applies animations over time, queues animations for later playback, mixes (crossfades) between
/// animations and layers animations on top of each other on separate tracks.
pub struct AnimationState {
    data: AnimationStateData,
    tracks: Vec<Track>,
    entries: Vec<EntrySlot>,
    free_list: Vec<usize>,
    event_queue: VecDeque<QueuedEvent>,
    drain_disabled: bool,
    listeners: Vec<(ListenerId, Option<Box<dyn AnimationStateListener>>)>,
    next_listener_id: u64,
    animations_changed: bool,
    property_ids: HashSet<PropertyId>,
    unkeyed_state: u32,
    /// Multiplier for every track's delta time.
    pub time_scale: f32,
}

impl std::fmt::Debug for AnimationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationState")
            .field("tracks", &self.tracks)
            .field("time_scale", &self.time_scale)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        Self {
            data,
            tracks: Vec::new(),
            entries: Vec::new(),
            free_list: Vec::new(),
            event_queue: VecDeque::new(),
            drain_disabled: false,
            listeners: Vec::new(),
            next_listener_id: 0,
            animations_changed: false,
            property_ids: HashSet::new(),
            unkeyed_state: 0,
            time_scale: 1.0,
        }
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    /// Number of track slots, including empty ones.
    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    /// The current entry of each track slot.
    pub fn tracks(&self) -> impl Iterator<Item = Option<TrackEntryHandle>> + '_ {
        self.tracks
            .iter()
            .map(|t| t.current.map(|id| TrackEntryHandle { id }))
    }

    pub fn current(&self, track_index: usize) -> Option<TrackEntryHandle> {
        let id = self.tracks.get(track_index)?.current?;
        Some(TrackEntryHandle { id })
    }

    /// Entries waiting on the track, in play order.
    pub fn queued(&self, track_index: usize) -> Vec<TrackEntryHandle> {
        self.tracks
            .get(track_index)
            .map(|t| t.queue.iter().map(|&id| TrackEntryHandle { id }).collect())
            .unwrap_or_default()
    }

    pub fn track_entry(&self, handle: TrackEntryHandle) -> Option<&TrackEntry> {
        self.entry(handle.id)
    }

    pub fn track_entry_mut(&mut self, handle: TrackEntryHandle) -> Option<&mut TrackEntry> {
        self.entry_mut(handle.id)
    }

    pub fn add_listener<L: AnimationStateListener + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Some(Box::new(listener))));
        id
    }

    /// Returns false if no such listener was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Discards queued notifications that have not been delivered yet.
    pub fn clear_listener_notifications(&mut self) {
        for queued in std::mem::take(&mut self.event_queue) {
            if queued.event == AnimationStateEvent::Dispose {
                self.free_entry(queued.entry);
            }
        }
    }

    /// Advances every track by `delta` seconds, promoting queued entries whose delay has passed.
    pub fn update(&mut self, delta: f32) {
        if !delta.is_finite() {
            log::warn!("ignoring non-finite animation state delta {delta}");
            return;
        }
        let delta = delta * self.time_scale;
        for track_index in 0..self.tracks.len() {
            let Some(current_id) = self.tracks[track_index].current else {
                continue;
            };
            let Some(current) = self.entry_mut(current_id) else {
                self.tracks[track_index].current = None;
                continue;
            };

            current.animation_last = current.next_animation_last;
            current.track_last = current.next_track_last;

            let mut current_delta = delta * current.time_scale;
            if current.delay > 0.0 {
                current.delay -= current_delta;
                if current.delay > 0.0 {
                    continue;
                }
                current_delta = -current.delay;
                current.delay = 0.0;
            }
            let track_last = current.track_last;
            let track_end = current.track_end;
            let time_scale = current.time_scale;
            let mixing = current.mixing_from.is_some();

            if let Some(next_id) = self.tracks[track_index].queue.front().copied() {
                // Switch to the next entry once its delay has passed, keeping the leftover time.
                let next_time = track_last - self.entry(next_id).map_or(0.0, |e| e.delay);
                if next_time >= 0.0 {
                    self.tracks[track_index].queue.pop_front();
                    if let Some(next) = self.entry_mut(next_id) {
                        next.delay = 0.0;
                        if time_scale != 0.0 {
                            next.track_time += (next_time / time_scale + delta) * next.time_scale;
                        }
                    }
                    if let Some(current) = self.entry_mut(current_id) {
                        current.track_time += current_delta;
                    }
                    self.set_current(track_index, next_id, true);
                    let mut id = next_id;
                    while let Some(from) = self.entry(id).and_then(|e| e.mixing_from) {
                        if let Some(entry) = self.entry_mut(id) {
                            entry.mix_time += delta;
                        }
                        id = from;
                    }
                    continue;
                }
            } else if track_last >= track_end && !mixing {
                self.tracks[track_index].current = None;
                self.queue_end(current_id);
                continue;
            }

            if mixing && self.update_mixing_from(current_id, delta) {
                // Every entry mixed from has finished.
                let mut from = self.entry_mut(current_id).and_then(|e| e.mixing_from.take());
                if let Some(entry) = from.and_then(|id| self.entry_mut(id)) {
                    entry.mixing_to = None;
                }
                while let Some(id) = from {
                    self.queue_end(id);
                    from = self.entry(id).and_then(|e| e.mixing_from);
                }
            }

            if let Some(current) = self.entry_mut(current_id) {
                current.track_time += current_delta;
            }
        }
        self.drain();
    }

    /// Returns true when every entry mixed into `to` has finished.
    fn update_mixing_from(&mut self, to: EntryId, delta: f32) -> bool {
        let Some(from) = self.entry(to).and_then(|e| e.mixing_from) else {
            return true;
        };
        let finished = self.update_mixing_from(from, delta);

        let Some(from_entry) = self.entry_mut(from) else {
            return finished;
        };
        from_entry.animation_last = from_entry.next_animation_last;
        from_entry.track_last = from_entry.next_track_last;
        let (from_total_alpha, from_mixing_from, from_interrupt_alpha) = (
            from_entry.total_alpha,
            from_entry.mixing_from,
            from_entry.interrupt_alpha,
        );

        let Some(to_entry) = self.entry_mut(to) else {
            return finished;
        };
        // A positive mix time means the mixed-from entry was applied at least once.
        if to_entry.mix_time > 0.0 && to_entry.mix_time >= to_entry.mix_duration {
            // Zero total alpha means the mix is complete, unless it was a single-frame mix.
            if from_total_alpha == 0.0 || to_entry.mix_duration == 0.0 {
                to_entry.mixing_from = from_mixing_from;
                to_entry.interrupt_alpha = from_interrupt_alpha;
                if let Some(entry) = from_mixing_from.and_then(|id| self.entry_mut(id)) {
                    entry.mixing_to = Some(to);
                }
                self.queue_end(from);
            }
            return finished;
        }

        to_entry.mix_time += delta;
        if let Some(from_entry) = self.entry_mut(from) {
            from_entry.track_time += delta * from_entry.time_scale;
        }
        false
    }

    /// Poses `skeleton` with every track's current entry, mixed with the entries it replaces.
    /// Returns true if any entry was applied.
    pub fn apply(&mut self, skeleton: &mut Skeleton) -> bool {
        if self.animations_changed {
            self.animations_changed();
        }

        let mut applied = false;
        for track_index in 0..self.tracks.len() {
            let Some(current_id) = self.tracks[track_index].current else {
                continue;
            };
            let Some(current) = self.entry(current_id) else {
                continue;
            };
            if current.delay > 0.0 {
                continue;
            }
            applied = true;
            let blend = if track_index == 0 {
                MixBlend::First
            } else {
                current.mix_blend
            };

            let mut mix = current.alpha;
            if current.mixing_from.is_some() {
                mix *= self.apply_mixing_from(current_id, skeleton, blend);
            } else if current.track_time >= current.track_end && self.tracks[track_index].queue.is_empty() {
                mix = 0.0;
            }

            let Some(current) = self.entry_mut(current_id) else {
                continue;
            };
            let animation = current.animation.clone();
            let animation_last = current.animation_last;
            let animation_time = current.animation_time();
            let reverse = current.reverse;
            let shortest_rotation = current.shortest_rotation;
            let timeline_mode = current.timeline_mode.clone();
            let mut rotation = std::mem::take(&mut current.timelines_rotation);
            let apply_time = if reverse {
                animation.duration() - animation_time
            } else {
                animation_time
            };

            let mut events = Vec::new();
            let timelines = animation.timelines();
            if (track_index == 0 && mix == 1.0) || blend == MixBlend::Add {
                for timeline in timelines {
                    match timeline {
                        Timeline::Attachment(t) => {
                            self.apply_attachment_timeline(t, skeleton, apply_time, blend, true);
                        }
                        _ => timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            (!reverse).then_some(&mut events),
                            mix,
                            blend,
                            MixDirection::In,
                        ),
                    }
                }
            } else {
                let first_frame = !shortest_rotation && rotation.len() != timelines.len() * 2;
                if first_frame {
                    rotation.resize(timelines.len() * 2, 0.0);
                }
                for (i, timeline) in timelines.iter().enumerate() {
                    let timeline_blend = if timeline_mode.get(i) == Some(&TimelineMode::Subsequent) {
                        blend
                    } else {
                        MixBlend::Setup
                    };
                    match timeline {
                        Timeline::Rotate(t) if !shortest_rotation => apply_mixed_rotate(
                            t,
                            skeleton,
                            apply_time,
                            mix,
                            timeline_blend,
                            &mut rotation,
                            i * 2,
                            first_frame,
                        ),
                        Timeline::Attachment(t) => {
                            self.apply_attachment_timeline(t, skeleton, apply_time, blend, true);
                        }
                        _ => timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            (!reverse).then_some(&mut events),
                            mix,
                            timeline_blend,
                            MixDirection::In,
                        ),
                    }
                }
            }

            self.queue_events(current_id, animation_time, &events);
            if let Some(current) = self.entry_mut(current_id) {
                current.timelines_rotation = rotation;
                current.next_animation_last = animation_time;
                current.next_track_last = current.track_time;
            }
        }

        // Slots whose attachment was only touched by entries mixing out return to the setup
        // attachment.
        let setup_state = self.unkeyed_state.wrapping_add(SETUP);
        for slot_index in 0..skeleton.slots.len() {
            if skeleton.slots[slot_index].attachment_state != setup_state {
                continue;
            }
            let attachment = skeleton
                .data
                .slots
                .get(slot_index)
                .and_then(|d| d.attachment_name.as_deref())
                .and_then(|name| skeleton.attachment(slot_index, name).cloned());
            skeleton.set_slot_attachment(slot_index, attachment);
        }
        self.unkeyed_state = self.unkeyed_state.wrapping_add(2);

        self.drain();
        applied
    }

    /// Applies the entries `to` is mixing from, oldest first, and returns `to`'s mix percent.
    fn apply_mixing_from(&mut self, to: EntryId, skeleton: &mut Skeleton, blend: MixBlend) -> f32 {
        let Some(from) = self.entry(to).and_then(|e| e.mixing_from) else {
            return 1.0;
        };
        if self.entry(from).is_some_and(|e| e.mixing_from.is_some()) {
            self.apply_mixing_from(from, skeleton, blend);
        }

        let Some(to_entry) = self.entry(to) else {
            return 1.0;
        };
        let (mix_duration, interrupt_alpha) = (to_entry.mix_duration, to_entry.interrupt_alpha);
        let Some(from_entry) = self.entry(from) else {
            return 1.0;
        };

        let mut blend = blend;
        let mix = if mix_duration == 0.0 {
            // Single frame mix to undo the mixed-from entry's changes.
            if blend == MixBlend::First {
                blend = MixBlend::Setup;
            }
            1.0
        } else {
            if blend != MixBlend::First {
                blend = from_entry.mix_blend;
            }
            (to_entry.mix_time / mix_duration).min(1.0)
        };

        let attachments = mix < from_entry.attachment_threshold;
        let draw_order = mix < from_entry.draw_order_threshold;
        let alpha_hold = from_entry.alpha * interrupt_alpha;
        let alpha_mix = alpha_hold * (1.0 - mix);
        let animation = from_entry.animation.clone();
        let animation_last = from_entry.animation_last;
        let animation_time = from_entry.animation_time();
        let reverse = from_entry.reverse;
        let shortest_rotation = from_entry.shortest_rotation;
        let fire_events = !reverse && mix < from_entry.event_threshold;
        let timeline_mode = from_entry.timeline_mode.clone();
        let timeline_hold_mix = from_entry.timeline_hold_mix.clone();
        let apply_time = if reverse {
            animation.duration() - animation_time
        } else {
            animation_time
        };

        let mut events = Vec::new();
        let timelines = animation.timelines();
        if blend == MixBlend::Add {
            for timeline in timelines {
                timeline.apply(
                    skeleton,
                    animation_last,
                    apply_time,
                    fire_events.then_some(&mut events),
                    alpha_mix,
                    blend,
                    MixDirection::Out,
                );
            }
        } else {
            let mut rotation = self
                .entry_mut(from)
                .map(|e| std::mem::take(&mut e.timelines_rotation))
                .unwrap_or_default();
            let first_frame = !shortest_rotation && rotation.len() != timelines.len() * 2;
            if first_frame {
                rotation.resize(timelines.len() * 2, 0.0);
            }

            let mut total_alpha = 0.0;
            for (i, timeline) in timelines.iter().enumerate() {
                let is_draw_order = matches!(timeline, Timeline::DrawOrder(_));
                let (timeline_blend, alpha) = match timeline_mode.get(i).copied().unwrap_or(TimelineMode::First) {
                    TimelineMode::Subsequent => {
                        if !draw_order && is_draw_order {
                            continue;
                        }
                        (blend, alpha_mix)
                    }
                    TimelineMode::First => (MixBlend::Setup, alpha_mix),
                    TimelineMode::HoldSubsequent => (blend, alpha_hold),
                    TimelineMode::HoldFirst => (MixBlend::Setup, alpha_hold),
                    TimelineMode::HoldMix => {
                        let fade = timeline_hold_mix
                            .get(i)
                            .copied()
                            .flatten()
                            .and_then(|id| self.entry(id))
                            .filter(|hold| hold.mix_duration > 0.0)
                            .map_or(0.0, |hold| (1.0 - hold.mix_time / hold.mix_duration).max(0.0));
                        (MixBlend::Setup, alpha_hold * fade)
                    }
                };
                total_alpha += alpha;

                match timeline {
                    Timeline::Rotate(t) if !shortest_rotation => apply_mixed_rotate(
                        t,
                        skeleton,
                        apply_time,
                        alpha,
                        timeline_blend,
                        &mut rotation,
                        i * 2,
                        first_frame,
                    ),
                    Timeline::Attachment(t) => {
                        self.apply_attachment_timeline(t, skeleton, apply_time, timeline_blend, attachments);
                    }
                    _ => {
                        let direction = if draw_order && is_draw_order && timeline_blend == MixBlend::Setup {
                            MixDirection::In
                        } else {
                            MixDirection::Out
                        };
                        timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            fire_events.then_some(&mut events),
                            alpha,
                            timeline_blend,
                            direction,
                        );
                    }
                }
            }
            if let Some(from_entry) = self.entry_mut(from) {
                from_entry.total_alpha = total_alpha;
                from_entry.timelines_rotation = rotation;
            }
        }

        if mix_duration > 0.0 {
            self.queue_events(from, animation_time, &events);
        }
        if let Some(from_entry) = self.entry_mut(from) {
            from_entry.next_animation_last = animation_time;
            from_entry.next_track_last = from_entry.track_time;
        }
        mix
    }

    fn apply_attachment_timeline(
        &self,
        timeline: &AttachmentTimeline,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        attachments: bool,
    ) {
        let slot_index = timeline.slot_index;
        let Some(slot) = skeleton.slots.get(slot_index) else {
            log::warn!("attachment timeline targets missing slot {slot_index}; skipped");
            return;
        };
        if !skeleton.bones.get(slot.bone()).is_some_and(|b| b.is_active()) {
            return;
        }
        let Some(&first) = timeline.frames.first() else {
            return;
        };

        if time < first {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                let name = timeline.setup_attachment_name(skeleton).map(str::to_string);
                self.set_attachment(timeline, skeleton, name.as_deref(), attachments);
            }
        } else {
            let name = timeline.attachment_names[search1(&timeline.frames, time)].clone();
            self.set_attachment(timeline, skeleton, name.as_deref(), attachments);
        }

        // Not keyed this frame: restore the setup attachment after all tracks are applied.
        let slot = &mut skeleton.slots[slot_index];
        if slot.attachment_state <= self.unkeyed_state {
            slot.attachment_state = self.unkeyed_state.wrapping_add(SETUP);
        }
    }

    fn set_attachment(
        &self,
        timeline: &AttachmentTimeline,
        skeleton: &mut Skeleton,
        name: Option<&str>,
        attachments: bool,
    ) {
        timeline.set_attachment(skeleton, name);
        if attachments {
            skeleton.slots[timeline.slot_index].attachment_state = self.unkeyed_state.wrapping_add(CURRENT);
        }
    }

    /// Queues the entry's fired events, with its complete event between those before and after
    /// the loop boundary.
    fn queue_events(&mut self, id: EntryId, animation_time: f32, events: &[Event]) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let animation_start = entry.animation_start;
        let animation_end = entry.animation_end;
        let duration = animation_end - animation_start;
        let track_last_wrapped = entry.track_last % duration;

        let split = if duration == 0.0 {
            events.len()
        } else {
            events
                .iter()
                .position(|e| e.time < track_last_wrapped)
                .unwrap_or(events.len())
        };
        let complete = if entry.looped {
            if duration == 0.0 {
                true
            } else {
                let cycles = (entry.track_time / duration).floor();
                cycles > 0.0 && cycles > (entry.track_last / duration).floor()
            }
        } else {
            animation_time >= animation_end && entry.animation_last < animation_end
        };

        for event in &events[..split] {
            if event.time <= animation_end {
                self.queue_event(id, event.clone());
            }
        }
        if complete {
            self.push_event(id, AnimationStateEvent::Complete);
        }
        for event in &events[split..] {
            if event.time >= animation_start {
                self.queue_event(id, event.clone());
            }
        }
    }

    /// Sets the named animation as current, discarding queued entries.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(animation_name)?;
        Ok(self.set_animation_with(track_index, animation, looped))
    }

    /// Sets `animation` as current, discarding queued entries. The previous current entry is mixed
    /// from, unless it was never applied, in which case it is replaced outright.
    pub fn set_animation_with(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
    ) -> TrackEntryHandle {
        let mut interrupt = true;
        let mut current = self.expand_to_index(track_index);
        if let Some(id) = current {
            if self.entry(id).is_some_and(|e| !e.was_applied()) {
                let from = self.entry(id).and_then(|e| e.mixing_from);
                self.tracks[track_index].current = from;
                self.push_event(id, AnimationStateEvent::Interrupt);
                self.queue_end(id);
                self.clear_next(track_index);
                current = from;
                interrupt = false;
            } else {
                self.clear_next(track_index);
            }
        }
        let id = self.new_entry(track_index, animation, looped, current);
        self.set_current(track_index, id, interrupt);
        self.drain();
        TrackEntryHandle { id }
    }

    /// Queues the named animation after the last entry on the track.
    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(animation_name)?;
        Ok(self.add_animation_with(track_index, animation, looped, delay))
    }

    /// Queues `animation` after the last entry on the track, or sets it current if the track is
    /// empty.
    ///
    /// A `delay <= 0` is relative to the previous entry's completion minus the mix duration, so
    /// the mix ends when the previous entry completes (or `-delay` seconds before).
    pub fn add_animation_with(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        delay: f32,
    ) -> TrackEntryHandle {
        self.expand_to_index(track_index);
        let track = &self.tracks[track_index];
        let last = track.queue.back().copied().or(track.current);

        let id = self.new_entry(track_index, animation, looped, last);
        let mut delay = delay;
        match last {
            None => {
                self.set_current(track_index, id, true);
                self.drain();
            }
            Some(last) => {
                self.tracks[track_index].queue.push_back(id);
                if delay <= 0.0 {
                    let last_complete = self.entry(last).map_or(0.0, TrackEntry::track_complete);
                    let mix_duration = self.entry(id).map_or(0.0, |e| e.mix_duration);
                    delay += last_complete - mix_duration;
                }
            }
        }
        if let Some(entry) = self.entry_mut(id) {
            entry.delay = delay;
        }
        TrackEntryHandle { id }
    }

    /// Sets an empty animation as current, mixing the track out to the setup pose (or lower
    /// tracks) over `mix_duration`.
    pub fn set_empty_animation(&mut self, track_index: usize, mix_duration: f32) -> Result<TrackEntryHandle, Error> {
        check_mix_duration(mix_duration)?;
        let empty = self.data.empty_animation.clone();
        let handle = self.set_animation_with(track_index, empty, false);
        if let Some(entry) = self.entry_mut(handle.id) {
            entry.mix_duration = mix_duration;
            entry.track_end = mix_duration;
        }
        Ok(handle)
    }

    /// Queues an empty animation after the last entry on the track.
    pub fn add_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        check_mix_duration(mix_duration)?;
        let empty = self.data.empty_animation.clone();
        let handle = self.add_animation_with(track_index, empty, false, delay);
        if let Some(entry) = self.entry_mut(handle.id) {
            if delay <= 0.0 {
                entry.delay += entry.mix_duration - mix_duration;
            }
            entry.mix_duration = mix_duration;
            entry.track_end = mix_duration;
        }
        Ok(handle)
    }

    /// Mixes every track out to an empty animation.
    pub fn set_empty_animations(&mut self, mix_duration: f32) -> Result<(), Error> {
        check_mix_duration(mix_duration)?;
        let old_drain_disabled = std::mem::replace(&mut self.drain_disabled, true);
        for track_index in 0..self.tracks.len() {
            if self.tracks[track_index].current.is_some() {
                self.set_empty_animation(track_index, mix_duration)?;
            }
        }
        self.drain_disabled = old_drain_disabled;
        self.drain();
        Ok(())
    }

    /// Removes every entry from the track, leaving the skeleton in its current pose.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(current) = self.tracks.get(track_index).and_then(|t| t.current) else {
            return;
        };
        self.queue_end(current);
        self.clear_next(track_index);

        let mut entry = current;
        while let Some(from) = self.entry(entry).and_then(|e| e.mixing_from) {
            self.queue_end(from);
            if let Some(e) = self.entry_mut(entry) {
                e.mixing_from = None;
                e.mixing_to = None;
            }
            entry = from;
        }
        self.tracks[track_index].current = None;
        self.drain();
    }

    pub fn clear_tracks(&mut self) {
        let old_drain_disabled = std::mem::replace(&mut self.drain_disabled, true);
        for track_index in 0..self.tracks.len() {
            self.clear_track(track_index);
        }
        self.tracks.clear();
        self.drain_disabled = old_drain_disabled;
        self.drain();
    }

    fn find_animation(&self, name: &str) -> Result<Arc<Animation>, Error> {
        match self.data.skeleton_data.find_animation(name) {
            Some(animation) => Ok(animation.clone()),
            None => {
                log::debug!("no animation named '{name}'");
                Err(Error::UnknownAnimation {
                    name: name.to_string(),
                })
            }
        }
    }

    fn expand_to_index(&mut self, index: usize) -> Option<EntryId> {
        if index >= self.tracks.len() {
            self.tracks.resize_with(index + 1, Track::default);
        }
        self.tracks[index].current
    }

    fn new_entry(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        last: Option<EntryId>,
    ) -> EntryId {
        let mix_duration = last
            .and_then(|id| self.entry(id))
            .map_or(0.0, |last| self.data.mix(&last.animation, &animation));
        let empty = Arc::ptr_eq(&animation, &self.data.empty_animation);
        self.alloc_entry(TrackEntry::new(track_index, animation, looped, mix_duration, empty))
    }

    fn set_current(&mut self, track_index: usize, id: EntryId, interrupt: bool) {
        let from = self.expand_to_index(track_index);
        self.tracks[track_index].current = Some(id);

        if let Some(from) = from {
            if interrupt {
                self.push_event(from, AnimationStateEvent::Interrupt);
            }
            // Keep the mix percent the interrupted entry had reached.
            let interrupted_mix = self.entry(from).and_then(TrackEntry::mix_percent);
            if let Some(entry) = self.entry_mut(id) {
                entry.mixing_from = Some(from);
                entry.mix_time = 0.0;
                if let Some(percent) = interrupted_mix {
                    entry.interrupt_alpha *= percent;
                }
            }
            if let Some(from_entry) = self.entry_mut(from) {
                from_entry.mixing_to = Some(id);
                // The entry may have been mixed in; mix it out along fresh directions.
                from_entry.timelines_rotation.clear();
            }
        }

        self.push_event(id, AnimationStateEvent::Start);
        self.animations_changed = true;
    }

    fn clear_next(&mut self, track_index: usize) {
        let queued = std::mem::take(&mut self.tracks[track_index].queue);
        for id in queued {
            self.push_event(id, AnimationStateEvent::Dispose);
        }
    }

    fn animations_changed(&mut self) {
        self.animations_changed = false;
        self.property_ids.clear();

        for track_index in 0..self.tracks.len() {
            let Some(mut id) = self.tracks[track_index].current else {
                continue;
            };
            while let Some(from) = self.entry(id).and_then(|e| e.mixing_from) {
                id = from;
            }
            let mut next = Some(id);
            while let Some(id) = next {
                let Some(entry) = self.entry(id) else {
                    break;
                };
                if entry.mixing_to.is_none() || entry.mix_blend != MixBlend::Add {
                    self.compute_hold(id);
                }
                next = self.entry(id).and_then(|e| e.mixing_to);
            }
        }
    }

    fn compute_hold(&mut self, id: EntryId) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let animation = entry.animation.clone();
        let to = entry.mixing_to.and_then(|to| self.entry(to).map(|e| (to, e)));
        let to_hold_previous = to.is_some_and(|(_, e)| e.hold_previous);
        let to_animation = to.map(|(_, e)| e.animation.clone());
        let to_mixing_to = to.and_then(|(_, e)| e.mixing_to);

        let timelines = animation.timelines();
        let mut timeline_mode = vec![TimelineMode::First; timelines.len()];
        let mut timeline_hold_mix = vec![None; timelines.len()];

        if to_hold_previous {
            for (i, timeline) in timelines.iter().enumerate() {
                timeline_mode[i] = if self.add_property_ids(&timeline.property_ids()) {
                    TimelineMode::HoldFirst
                } else {
                    TimelineMode::HoldSubsequent
                };
            }
        } else {
            'timelines: for (i, timeline) in timelines.iter().enumerate() {
                let ids = timeline.property_ids();
                if !self.add_property_ids(&ids) {
                    timeline_mode[i] = TimelineMode::Subsequent;
                    continue;
                }
                let instant = matches!(
                    timeline,
                    Timeline::Attachment(_) | Timeline::DrawOrder(_) | Timeline::Event(_)
                );
                let Some(to_animation) = to_animation.as_ref() else {
                    continue;
                };
                if instant || !to_animation.has_timeline(&ids) {
                    continue;
                }
                let mut next = to_mixing_to;
                while let Some(next_id) = next {
                    let Some(next_entry) = self.entry(next_id) else {
                        break;
                    };
                    if next_entry.animation.has_timeline(&ids) {
                        next = next_entry.mixing_to;
                        continue;
                    }
                    if next_entry.mix_duration > 0.0 {
                        timeline_mode[i] = TimelineMode::HoldMix;
                        timeline_hold_mix[i] = Some(next_id);
                        continue 'timelines;
                    }
                    break;
                }
                timeline_mode[i] = TimelineMode::HoldFirst;
            }
        }

        if let Some(entry) = self.entry_mut(id) {
            entry.timeline_mode = timeline_mode;
            entry.timeline_hold_mix = timeline_hold_mix;
        }
    }

    /// Returns true if any of `ids` was not yet keyed by an earlier entry.
    fn add_property_ids(&mut self, ids: &[PropertyId]) -> bool {
        let mut added = false;
        for &id in ids {
            added |= self.property_ids.insert(id);
        }
        added
    }

    fn alloc_entry(&mut self, entry: TrackEntry) -> EntryId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.entry = Some(entry);
            EntryId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.entries.len();
            self.entries.push(EntrySlot {
                generation: 0,
                entry: Some(entry),
            });
            EntryId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: EntryId) -> Option<&TrackEntry> {
        let slot = self.entries.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut TrackEntry> {
        let slot = self.entries.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn free_entry(&mut self, id: EntryId) {
        let Some(slot) = self.entries.get_mut(id.index) else {
            return;
        };
        if slot.generation != id.generation || slot.entry.is_none() {
            return;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
    }

    fn snapshot(&self, id: EntryId) -> Option<TrackEntrySnapshot> {
        let entry = self.entry(id)?;
        Some(TrackEntrySnapshot {
            handle: TrackEntryHandle { id },
            track_index: entry.track_index,
            animation_name: entry.animation.name().to_string(),
            track_time: entry.track_time,
            animation_time: entry.animation_time(),
        })
    }

    fn push_event(&mut self, entry: EntryId, event: AnimationStateEvent) {
        self.event_queue.push_back(QueuedEvent { entry, event });
    }

    fn queue_event(&mut self, entry: EntryId, event: Event) {
        self.push_event(entry, AnimationStateEvent::Event(event));
    }

    /// Queues end then dispose.
    fn queue_end(&mut self, entry: EntryId) {
        self.push_event(entry, AnimationStateEvent::End);
        self.push_event(entry, AnimationStateEvent::Dispose);
        self.animations_changed = true;
    }

    /// Delivers queued events: the entry's listener first, then the state's listeners in the
    /// order they were added. Events queued by listeners are delivered in the same drain.
    fn drain(&mut self) {
        if self.drain_disabled {
            return;
        }
        self.drain_disabled = true;

        while let Some(QueuedEvent { entry, event }) = self.event_queue.pop_front() {
            let Some(snapshot) = self.snapshot(entry) else {
                continue;
            };
            log::trace!(
                "track {} '{}': {:?}",
                snapshot.track_index,
                snapshot.animation_name,
                event
            );

            if let Some(mut listener) = self.entry_mut(entry).and_then(|e| e.listener.take()) {
                listener.on_event(self, &snapshot, &event);
                if let Some(e) = self.entry_mut(entry) {
                    if e.listener.is_none() {
                        e.listener = Some(listener);
                    }
                }
            }

            let ids = self.listeners.iter().map(|(id, _)| *id).collect::<Vec<_>>();
            for id in ids {
                let Some(mut listener) = self
                    .listeners
                    .iter_mut()
                    .find(|(l, _)| *l == id)
                    .and_then(|(_, l)| l.take())
                else {
                    continue;
                };
                listener.on_event(self, &snapshot, &event);
                // Removed while it was running: drop it.
                if let Some((_, slot)) = self.listeners.iter_mut().find(|(l, _)| *l == id) {
                    *slot = Some(listener);
                }
            }

            if event == AnimationStateEvent::Dispose {
                self.free_entry(entry);
            }
        }

        self.drain_disabled = false;
    }
}

fn check_mix_duration(mix_duration: f32) -> Result<(), Error> {
    if mix_duration.is_finite() && mix_duration >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidValue {
            message: format!("mix duration must be finite and >= 0, got {mix_duration}"),
        })
    }
}

/// Mixes a rotation with `alpha < 1`, remembering the direction chosen on the first frame so the
/// bone does not flip the other way when the two rotations cross.
///
/// `rotation[i]` holds the total mixed angle including whole turns and `rotation[i + 1]` the last
/// difference between the two rotations.
#[allow(clippy::too_many_arguments)]
fn apply_mixed_rotate(
    timeline: &BoneTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    rotation: &mut [f32],
    i: usize,
    first_frame: bool,
) {
    if first_frame {
        if let Some(total) = rotation.get_mut(i) {
            *total = 0.0;
        }
    }
    if alpha == 1.0 || i + 1 >= rotation.len() {
        apply_rotate(timeline, skeleton, time, alpha, blend);
        return;
    }

    let Some(setup) = skeleton.data.bones.get(timeline.bone_index).map(|b| b.rotation) else {
        return;
    };
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.is_active() || timeline.frames.frame_count() == 0 {
        return;
    }

    let (r1, r2) = if time < timeline.frames.start_time() {
        match blend {
            MixBlend::Setup => {
                bone.rotation = setup;
                return;
            }
            MixBlend::First => (bone.rotation, setup),
            MixBlend::Replace | MixBlend::Add => return,
        }
    } else {
        let r1 = if blend == MixBlend::Setup {
            setup
        } else {
            bone.rotation
        };
        (r1, setup + rotate_value(&timeline.frames, time))
    };

    let diff = math::shortest_rotation_delta(r2 - r1);
    let total = if diff == 0.0 {
        rotation[i]
    } else {
        let (mut last_total, last_diff) = if first_frame {
            (0.0, diff)
        } else {
            (rotation[i], rotation[i + 1])
        };
        let current = diff > 0.0;
        let mut dir = last_total >= 0.0;
        // A sign change near 0 (not near 180) means the rotations crossed.
        if math::signum(last_diff) != math::signum(diff) && last_diff.abs() <= 90.0 {
            // Crossing after a whole turn is a loop.
            if last_total.abs() > 180.0 {
                last_total += 360.0 * math::signum(last_total);
            }
            dir = current;
        }
        let mut total = diff + last_total - last_total % 360.0;
        if dir != current {
            total += 360.0 * math::signum(last_total);
        }
        rotation[i] = total;
        total
    };
    rotation[i + 1] = diff;
    bone.rotation = r1 + total * alpha;
}
