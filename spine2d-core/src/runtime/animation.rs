use std::collections::HashSet;

use crate::{Error, Event, MixBlend, MixDirection, PropertyId, Skeleton, Timeline};

/// A named, immutable list of timelines.
#[derive(Clone, Debug)]
pub struct Animation {
    name: String,
    timelines: Vec<Timeline>,
    timeline_ids: HashSet<PropertyId>,
    duration: f32,
}

impl Animation {
    /// Builds an animation, checking every timeline's keys. `duration` is usually the time of the
    /// latest key across all timelines; see [`Animation::from_timelines`].
    pub fn new(name: impl Into<String>, timelines: Vec<Timeline>, duration: f32) -> Result<Self, Error> {
        let name = name.into();
        if duration.is_nan() || duration < 0.0 {
            return Err(Error::InvalidAnimation {
                name,
                message: format!("duration must be a non-negative number, got {duration}"),
            });
        }
        for (i, timeline) in timelines.iter().enumerate() {
            if let Err(message) = timeline.validate() {
                return Err(Error::InvalidAnimation {
                    name,
                    message: format!("timeline {i}: {message}"),
                });
            }
        }
        let timeline_ids = timelines.iter().flat_map(Timeline::property_ids).collect();
        Ok(Self {
            name,
            timelines,
            timeline_ids,
            duration,
        })
    }

    /// Builds an animation whose duration is the latest key time across `timelines`.
    pub fn from_timelines(name: impl Into<String>, timelines: Vec<Timeline>) -> Result<Self, Error> {
        let duration = timelines
            .iter()
            .map(Timeline::duration)
            .fold(0.0_f32, f32::max);
        Self::new(name, timelines, duration)
    }

    /// An animation with no timelines, used to mix tracks in from or out to the setup pose.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timelines: Vec::new(),
            timeline_ids: HashSet::new(),
            duration: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    /// True if any timeline keys one of `ids`.
    pub fn has_timeline(&self, ids: &[PropertyId]) -> bool {
        ids.iter().any(|id| self.timeline_ids.contains(id))
    }

    /// Applies every timeline at `time`. When `looped`, both times wrap into the duration first,
    /// so `last_time > time` marks a loop boundary for event timelines.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        mut last_time: f32,
        mut time: f32,
        looped: bool,
        mut events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        if looped && self.duration != 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }
        for timeline in &self.timelines {
            timeline.apply(
                skeleton,
                last_time,
                time,
                events.as_deref_mut(),
                alpha,
                blend,
                direction,
            );
        }
    }
}
