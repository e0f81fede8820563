//! Caller-invoked JSON dumps of the live pose and playback state, for diffing against other
//! runtimes or inspecting a frame by hand.

use serde::Serialize;

use crate::{AnimationState, Color, Error, Skeleton, TrackEntryHandle, UpdateCacheItem};

#[derive(Clone, Debug, Serialize)]
pub struct SkeletonDump {
    pub time: f32,
    pub skin: Option<String>,
    pub bones: Vec<BoneDump>,
    pub slots: Vec<SlotDump>,
    pub draw_order: Vec<String>,
    pub update_cache: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BoneDump {
    pub name: String,
    pub active: bool,
    pub local: [f32; 7],
    pub applied: [f32; 7],
    pub world: [f32; 6],
}

#[derive(Clone, Debug, Serialize)]
pub struct SlotDump {
    pub name: String,
    pub attachment: Option<String>,
    pub color: Color,
    pub dark_color: Option<Color>,
    pub deform: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnimationStateDump {
    pub time_scale: f32,
    pub tracks: Vec<Option<TrackDump>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrackDump {
    pub current: TrackEntryDump,
    pub mixing_from: Vec<TrackEntryDump>,
    pub queued: Vec<TrackEntryDump>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrackEntryDump {
    pub animation: String,
    pub looped: bool,
    pub delay: f32,
    pub track_time: f32,
    pub animation_time: f32,
    pub track_end: f32,
    pub time_scale: f32,
    pub alpha: f32,
    pub mix_time: f32,
    pub mix_duration: f32,
}

pub fn skeleton_snapshot(skeleton: &Skeleton) -> SkeletonDump {
    let data = &skeleton.data;
    let bone_name = |i: usize| data.bones.get(i).map(|b| b.name.clone()).unwrap_or_default();
    let slot_name = |i: usize| data.slots.get(i).map(|s| s.name.clone()).unwrap_or_default();

    let bones = skeleton
        .bones
        .iter()
        .enumerate()
        .map(|(i, b)| BoneDump {
            name: bone_name(i),
            active: b.is_active(),
            local: [b.x, b.y, b.rotation, b.scale_x, b.scale_y, b.shear_x, b.shear_y],
            applied: [b.ax, b.ay, b.arotation, b.ascale_x, b.ascale_y, b.ashear_x, b.ashear_y],
            world: [b.a, b.b, b.c, b.d, b.world_x, b.world_y],
        })
        .collect();
    let slots = skeleton
        .slots
        .iter()
        .enumerate()
        .map(|(i, s)| SlotDump {
            name: slot_name(i),
            attachment: s.attachment().map(|a| a.name().to_string()),
            color: s.color,
            dark_color: s.dark_color,
            deform: s.deform.len(),
        })
        .collect();
    let update_cache = skeleton
        .update_cache_items()
        .iter()
        .map(|item| match *item {
            UpdateCacheItem::Bone(i) => format!("bone:{}", bone_name(i)),
            UpdateCacheItem::Ik(i) => {
                format!("ik:{}", data.ik_constraints.get(i).map_or("", |c| c.name.as_str()))
            }
            UpdateCacheItem::Transform(i) => format!(
                "transform:{}",
                data.transform_constraints.get(i).map_or("", |c| c.name.as_str())
            ),
            UpdateCacheItem::Path(i) => {
                format!("path:{}", data.path_constraints.get(i).map_or("", |c| c.name.as_str()))
            }
        })
        .collect();

    SkeletonDump {
        time: skeleton.time(),
        skin: skeleton.skin().map(|s| s.name().to_string()),
        bones,
        slots,
        draw_order: skeleton.draw_order.iter().map(|&i| slot_name(i)).collect(),
        update_cache,
    }
}

pub fn animation_state_snapshot(state: &AnimationState) -> AnimationStateDump {
    let entry_dump = |handle: TrackEntryHandle| {
        let entry = state.track_entry(handle)?;
        Some(TrackEntryDump {
            animation: entry.animation().name().to_string(),
            looped: entry.looped,
            delay: entry.delay,
            track_time: entry.track_time,
            animation_time: entry.animation_time(),
            track_end: entry.track_end,
            time_scale: entry.time_scale,
            alpha: entry.alpha,
            mix_time: entry.mix_time,
            mix_duration: entry.mix_duration,
        })
    };

    let tracks = state
        .tracks()
        .enumerate()
        .map(|(track_index, current)| {
            let current_handle = current?;
            let current = entry_dump(current_handle)?;
            let mut mixing_from = Vec::new();
            let mut from = state
                .track_entry(current_handle)
                .and_then(|e| e.mixing_from());
            while let Some(handle) = from {
                if let Some(dump) = entry_dump(handle) {
                    mixing_from.push(dump);
                }
                from = state.track_entry(handle).and_then(|e| e.mixing_from());
            }
            let queued = state
                .queued(track_index)
                .into_iter()
                .filter_map(|handle| entry_dump(handle))
                .collect();
            Some(TrackDump {
                current,
                mixing_from,
                queued,
            })
        })
        .collect();

    AnimationStateDump {
        time_scale: state.time_scale,
        tracks,
    }
}

/// Pretty JSON of the skeleton's local, applied and world transforms, slots and update order.
pub fn skeleton_dump(skeleton: &Skeleton) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(&skeleton_snapshot(skeleton))?)
}

/// Pretty JSON of every track's current, mixing-from and queued entries.
pub fn animation_state_dump(state: &AnimationState) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(&animation_state_snapshot(state))?)
}
