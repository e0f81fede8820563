use crate::runtime::curve::search1;
use crate::{Color, CurveFrames, Event, Skeleton, math};

/// How a timeline value combines with the setup or current pose when `alpha < 1`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixBlend {
    /// Blend from the setup value. Before the first key the setup value is set.
    Setup,
    /// Blend from the current value. Before the first key, blend from the current value toward the
    /// setup value. Meant for the lowest track.
    First,
    /// Blend from the current value. Before the first key nothing changes.
    Replace,
    /// Add the timeline value to the current value. Before the first key nothing changes.
    Add,
}

/// Whether `alpha` is fading a timeline in toward its value or out toward the pose below.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

/// A pose property a timeline writes. Two timelines with the same id compete for the same value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PropertyId {
    Rotate(usize),
    X(usize),
    Y(usize),
    ScaleX(usize),
    ScaleY(usize),
    ShearX(usize),
    ShearY(usize),
    Rgb(usize),
    Alpha(usize),
    Rgb2(usize),
    Attachment(usize),
    Deform { slot: usize, attachment: u32 },
    Event,
    DrawOrder,
    IkConstraint(usize),
    TransformConstraint(usize),
    PathConstraintPosition(usize),
    PathConstraintSpacing(usize),
    PathConstraintMix(usize),
}

/// Keys for one bone property.
#[derive(Clone, Debug)]
pub struct BoneTimeline {
    pub bone_index: usize,
    pub frames: CurveFrames,
}

impl BoneTimeline {
    pub fn new(bone_index: usize, frames: CurveFrames) -> Self {
        Self { bone_index, frames }
    }
}

/// Keys for a slot's colors.
#[derive(Clone, Debug)]
pub struct SlotTimeline {
    pub slot_index: usize,
    pub frames: CurveFrames,
}

impl SlotTimeline {
    pub fn new(slot_index: usize, frames: CurveFrames) -> Self {
        Self { slot_index, frames }
    }
}

/// Keys for one IK, transform or path constraint.
#[derive(Clone, Debug)]
pub struct ConstraintTimeline {
    pub constraint_index: usize,
    pub frames: CurveFrames,
}

impl ConstraintTimeline {
    pub fn new(constraint_index: usize, frames: CurveFrames) -> Self {
        Self {
            constraint_index,
            frames,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AttachmentTimeline {
    pub slot_index: usize,
    pub frames: Vec<f32>,
    /// `None` clears the slot's attachment.
    pub attachment_names: Vec<Option<String>>,
}

impl AttachmentTimeline {
    pub fn new(slot_index: usize, frame_count: usize) -> Self {
        Self {
            slot_index,
            frames: vec![0.0; frame_count],
            attachment_names: vec![None; frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, attachment_name: Option<&str>) {
        if frame < self.frames.len() {
            self.frames[frame] = time;
            self.attachment_names[frame] = attachment_name.map(str::to_string);
        }
    }

    pub(crate) fn set_attachment(&self, skeleton: &mut Skeleton, name: Option<&str>) {
        let attachment = name.and_then(|n| skeleton.attachment(self.slot_index, n).cloned());
        skeleton.set_slot_attachment(self.slot_index, attachment);
    }

    pub(crate) fn setup_attachment_name<'a>(&self, skeleton: &'a Skeleton) -> Option<&'a str> {
        skeleton
            .data
            .slots
            .get(self.slot_index)
            .and_then(|d| d.attachment_name.as_deref())
    }
}

/// Per-key vertex positions (unweighted attachments) or offsets (weighted attachments).
#[derive(Clone, Debug)]
pub struct DeformTimeline {
    pub slot_index: usize,
    /// Deform id of the vertex attachment the keys were made for.
    pub attachment_id: u32,
    pub frames: CurveFrames,
    pub vertices: Vec<Vec<f32>>,
}

impl DeformTimeline {
    /// `frames` carries key times only; set per-key easing with
    /// [`CurveFrames::set_bezier_percent`].
    pub fn new(slot_index: usize, attachment_id: u32, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            slot_index,
            attachment_id,
            frames: CurveFrames::new(frame_count, bezier_count, 0),
            vertices: vec![Vec::new(); frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, vertices: Vec<f32>) {
        if frame < self.vertices.len() {
            self.frames.set_frame(frame, time, &[]);
            self.vertices[frame] = vertices;
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventTimeline {
    pub frames: Vec<f32>,
    pub events: Vec<Event>,
}

impl EventTimeline {
    /// Builds the timeline from events sorted by time.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            frames: events.iter().map(|e| e.time).collect(),
            events,
        }
    }

    /// Appends to `fired` the events with `last_time < time_key <= time`. When `last_time > time`
    /// the animation looped: events after `last_time` fire first, then those from the start.
    pub fn fire(&self, last_time: f32, time: f32, fired: &mut Vec<Event>) {
        let Some(&last_key) = self.frames.last() else {
            return;
        };
        let mut last_time = last_time;
        if last_time > time {
            self.fire(last_time, f32::MAX, fired);
            last_time = -1.0;
        } else if last_time >= last_key {
            return;
        }
        if time < self.frames[0] {
            return;
        }

        let mut i = if last_time < self.frames[0] {
            0
        } else {
            let mut i = search1(&self.frames, last_time) + 1;
            if i < self.frames.len() {
                let frame_time = self.frames[i];
                // Fire every event sharing a key time.
                while i > 0 && self.frames[i - 1] == frame_time {
                    i -= 1;
                }
            }
            i
        };
        while i < self.frames.len() && time >= self.frames[i] {
            fired.push(self.events[i].clone());
            i += 1;
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DrawOrderTimeline {
    pub frames: Vec<f32>,
    /// For each key, the setup slot index to draw at each position. `None` restores setup order.
    pub draw_orders: Vec<Option<Vec<usize>>>,
}

impl DrawOrderTimeline {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![0.0; frame_count],
            draw_orders: vec![None; frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, draw_order: Option<Vec<usize>>) {
        if frame < self.frames.len() {
            self.frames[frame] = time;
            self.draw_orders[frame] = draw_order;
        }
    }
}

/// One keyed property stream of an [`crate::Animation`].
#[derive(Clone, Debug)]
pub enum Timeline {
    Rotate(BoneTimeline),
    Translate(BoneTimeline),
    TranslateX(BoneTimeline),
    TranslateY(BoneTimeline),
    Scale(BoneTimeline),
    ScaleX(BoneTimeline),
    ScaleY(BoneTimeline),
    Shear(BoneTimeline),
    ShearX(BoneTimeline),
    ShearY(BoneTimeline),
    /// Values `[r, g, b, a]`.
    Rgba(SlotTimeline),
    /// Values `[r, g, b]`.
    Rgb(SlotTimeline),
    Alpha(SlotTimeline),
    /// Values `[r, g, b, a, r2, g2, b2]`, light then dark color.
    Rgba2(SlotTimeline),
    /// Values `[r, g, b, r2, g2, b2]`.
    Rgb2(SlotTimeline),
    Attachment(AttachmentTimeline),
    Deform(DeformTimeline),
    Event(EventTimeline),
    DrawOrder(DrawOrderTimeline),
    /// Values `[mix, softness, bend_direction, compress, stretch]`; the last three are stepped.
    IkConstraint(ConstraintTimeline),
    /// Values `[rotate_mix, translate_mix, scale_mix, shear_mix]`.
    TransformConstraint(ConstraintTimeline),
    PathConstraintPosition(ConstraintTimeline),
    PathConstraintSpacing(ConstraintTimeline),
    /// Values `[rotate_mix, translate_mix]`.
    PathConstraintMix(ConstraintTimeline),
}

impl Timeline {
    pub fn property_ids(&self) -> Vec<PropertyId> {
        use PropertyId as P;
        match self {
            Self::Rotate(t) => vec![P::Rotate(t.bone_index)],
            Self::Translate(t) => vec![P::X(t.bone_index), P::Y(t.bone_index)],
            Self::TranslateX(t) => vec![P::X(t.bone_index)],
            Self::TranslateY(t) => vec![P::Y(t.bone_index)],
            Self::Scale(t) => vec![P::ScaleX(t.bone_index), P::ScaleY(t.bone_index)],
            Self::ScaleX(t) => vec![P::ScaleX(t.bone_index)],
            Self::ScaleY(t) => vec![P::ScaleY(t.bone_index)],
            Self::Shear(t) => vec![P::ShearX(t.bone_index), P::ShearY(t.bone_index)],
            Self::ShearX(t) => vec![P::ShearX(t.bone_index)],
            Self::ShearY(t) => vec![P::ShearY(t.bone_index)],
            Self::Rgba(t) => vec![P::Rgb(t.slot_index), P::Alpha(t.slot_index)],
            Self::Rgb(t) => vec![P::Rgb(t.slot_index)],
            Self::Alpha(t) => vec![P::Alpha(t.slot_index)],
            Self::Rgba2(t) => vec![P::Rgb(t.slot_index), P::Alpha(t.slot_index), P::Rgb2(t.slot_index)],
            Self::Rgb2(t) => vec![P::Rgb(t.slot_index), P::Rgb2(t.slot_index)],
            Self::Attachment(t) => vec![P::Attachment(t.slot_index)],
            Self::Deform(t) => vec![P::Deform {
                slot: t.slot_index,
                attachment: t.attachment_id,
            }],
            Self::Event(_) => vec![P::Event],
            Self::DrawOrder(_) => vec![P::DrawOrder],
            Self::IkConstraint(t) => vec![P::IkConstraint(t.constraint_index)],
            Self::TransformConstraint(t) => vec![P::TransformConstraint(t.constraint_index)],
            Self::PathConstraintPosition(t) => vec![P::PathConstraintPosition(t.constraint_index)],
            Self::PathConstraintSpacing(t) => vec![P::PathConstraintSpacing(t.constraint_index)],
            Self::PathConstraintMix(t) => vec![P::PathConstraintMix(t.constraint_index)],
        }
    }

    /// The curve-keyed frames, for timelines that interpolate.
    pub fn curve_frames(&self) -> Option<&CurveFrames> {
        match self {
            Self::Rotate(t)
            | Self::Translate(t)
            | Self::TranslateX(t)
            | Self::TranslateY(t)
            | Self::Scale(t)
            | Self::ScaleX(t)
            | Self::ScaleY(t)
            | Self::Shear(t)
            | Self::ShearX(t)
            | Self::ShearY(t) => Some(&t.frames),
            Self::Rgba(t) | Self::Rgb(t) | Self::Alpha(t) | Self::Rgba2(t) | Self::Rgb2(t) => {
                Some(&t.frames)
            }
            Self::IkConstraint(t)
            | Self::TransformConstraint(t)
            | Self::PathConstraintPosition(t)
            | Self::PathConstraintSpacing(t)
            | Self::PathConstraintMix(t) => Some(&t.frames),
            Self::Deform(t) => Some(&t.frames),
            Self::Attachment(_) | Self::Event(_) | Self::DrawOrder(_) => None,
        }
    }

    fn key_times(&self) -> Vec<f32> {
        match self {
            Self::Attachment(t) => t.frames.clone(),
            Self::Event(t) => t.frames.clone(),
            Self::DrawOrder(t) => t.frames.clone(),
            other => other
                .curve_frames()
                .map(|f| f.frames().iter().step_by(f.entries()).copied().collect())
                .unwrap_or_default(),
        }
    }

    fn expected_value_count(&self) -> usize {
        match self {
            Self::Rotate(_)
            | Self::TranslateX(_)
            | Self::TranslateY(_)
            | Self::ScaleX(_)
            | Self::ScaleY(_)
            | Self::ShearX(_)
            | Self::ShearY(_)
            | Self::Alpha(_)
            | Self::PathConstraintPosition(_)
            | Self::PathConstraintSpacing(_) => 1,
            Self::Translate(_) | Self::Scale(_) | Self::Shear(_) | Self::PathConstraintMix(_) => 2,
            Self::Rgb(_) => 3,
            Self::Rgba(_) | Self::TransformConstraint(_) => 4,
            Self::IkConstraint(_) => 5,
            Self::Rgb2(_) => 6,
            Self::Rgba2(_) => 7,
            Self::Deform(_) | Self::Attachment(_) | Self::Event(_) | Self::DrawOrder(_) => 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        match self {
            Self::Attachment(t) => t.frames.len(),
            Self::Event(t) => t.frames.len(),
            Self::DrawOrder(t) => t.frames.len(),
            other => other.curve_frames().map(CurveFrames::frame_count).unwrap_or(0),
        }
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        self.key_times().last().copied().unwrap_or(0.0)
    }

    /// Checks the shape of the keys: value counts, finite ordered times, and per-key payloads.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(frames) = self.curve_frames() {
            if frames.value_count() != self.expected_value_count() {
                return Err(format!(
                    "{:?} keys need {} values, got {}",
                    self.property_ids().first(),
                    self.expected_value_count(),
                    frames.value_count()
                ));
            }
        }
        let times = self.key_times();
        if times.is_empty() {
            return Err("timeline has no keys".to_string());
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err("key time is not finite".to_string());
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err("key times are not sorted".to_string());
        }
        match self {
            Self::Attachment(t) if t.attachment_names.len() != t.frames.len() => {
                Err("attachment names do not match keys".to_string())
            }
            Self::Event(t) if t.events.len() != t.frames.len() => {
                Err("events do not match keys".to_string())
            }
            Self::DrawOrder(t) if t.draw_orders.len() != t.frames.len() => {
                Err("draw orders do not match keys".to_string())
            }
            Self::Deform(t) => {
                let count = t.vertices.first().map(Vec::len).unwrap_or(0);
                if t.vertices.len() != t.frames.frame_count()
                    || t.vertices.iter().any(|v| v.len() != count)
                {
                    Err("deform keys have mismatched vertex counts".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Poses the skeleton with this timeline's value at `time`.
    ///
    /// `last_time` is only used by event timelines, which append the events they pass to
    /// `events`. Attachment and draw-order timelines switch instantly and ignore `alpha`; mixing
    /// out they only act with [`MixBlend::Setup`].
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Self::Rotate(t) => apply_rotate(t, skeleton, time, alpha, blend),
            Self::Translate(t) => {
                apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::X, 0);
                apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::Y, 1);
            }
            Self::TranslateX(t) => apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::X, 0),
            Self::TranslateY(t) => apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::Y, 0),
            Self::Scale(t) => {
                apply_bone_scale(t, skeleton, time, alpha, blend, direction, BoneField::ScaleX, 0);
                apply_bone_scale(t, skeleton, time, alpha, blend, direction, BoneField::ScaleY, 1);
            }
            Self::ScaleX(t) => {
                apply_bone_scale(t, skeleton, time, alpha, blend, direction, BoneField::ScaleX, 0)
            }
            Self::ScaleY(t) => {
                apply_bone_scale(t, skeleton, time, alpha, blend, direction, BoneField::ScaleY, 0)
            }
            Self::Shear(t) => {
                apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::ShearX, 0);
                apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::ShearY, 1);
            }
            Self::ShearX(t) => {
                apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::ShearX, 0)
            }
            Self::ShearY(t) => {
                apply_bone_relative(t, skeleton, time, alpha, blend, BoneField::ShearY, 0)
            }
            Self::Rgba(t) => apply_color(t, skeleton, time, alpha, blend, ColorChannels::Rgba),
            Self::Rgb(t) => apply_color(t, skeleton, time, alpha, blend, ColorChannels::Rgb),
            Self::Alpha(t) => apply_color(t, skeleton, time, alpha, blend, ColorChannels::Alpha),
            Self::Rgba2(t) => apply_color(t, skeleton, time, alpha, blend, ColorChannels::Rgba2),
            Self::Rgb2(t) => apply_color(t, skeleton, time, alpha, blend, ColorChannels::Rgb2),
            Self::Attachment(t) => apply_attachment(t, skeleton, time, blend, direction),
            Self::Deform(t) => apply_deform(t, skeleton, time, alpha, blend),
            Self::Event(t) => {
                if let Some(events) = events {
                    t.fire(last_time, time, events);
                }
            }
            Self::DrawOrder(t) => apply_draw_order(t, skeleton, time, blend, direction),
            Self::IkConstraint(t) => apply_ik(t, skeleton, time, alpha, blend, direction),
            Self::TransformConstraint(t) => apply_transform_mix(t, skeleton, time, alpha, blend),
            Self::PathConstraintPosition(t) => apply_path_value(t, skeleton, time, alpha, blend, false),
            Self::PathConstraintSpacing(t) => apply_path_value(t, skeleton, time, alpha, blend, true),
            Self::PathConstraintMix(t) => apply_path_mix(t, skeleton, time, alpha, blend),
        }
    }
}

fn warn_missing(kind: &str, index: usize) {
    log::warn!("timeline targets missing {kind} {index}; skipped");
}

/// Value before the first key: setup and first blends move toward the setup value.
fn before_first(blend: MixBlend, alpha: f32, current: f32, setup: f32) -> f32 {
    match blend {
        MixBlend::Setup => setup,
        MixBlend::First => current + (setup - current) * alpha,
        MixBlend::Replace | MixBlend::Add => current,
    }
}

/// Keyed value as an offset from the setup value.
fn relative_value(
    frames: &CurveFrames,
    value: usize,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    current: f32,
    setup: f32,
) -> f32 {
    if time < frames.start_time() {
        return before_first(blend, alpha, current, setup);
    }
    let v = frames.value_at(time, value);
    match blend {
        MixBlend::Setup => setup + v * alpha,
        MixBlend::First | MixBlend::Replace => current + (v + setup - current) * alpha,
        MixBlend::Add => current + v * alpha,
    }
}

/// Keyed value replacing the current value outright.
fn absolute_value(
    frames: &CurveFrames,
    value: usize,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    current: f32,
    setup: f32,
) -> f32 {
    if time < frames.start_time() {
        return before_first(blend, alpha, current, setup);
    }
    let v = frames.value_at(time, value);
    if blend == MixBlend::Setup {
        setup + (v - setup) * alpha
    } else {
        current + (v - current) * alpha
    }
}

/// Keyed value as a multiple of the setup scale. Mixing keeps the sign of the pose being mixed
/// from so a flip does not collapse through zero.
#[allow(clippy::too_many_arguments)]
fn scale_value(
    frames: &CurveFrames,
    value: usize,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
    current: f32,
    setup: f32,
) -> f32 {
    if time < frames.start_time() {
        return before_first(blend, alpha, current, setup);
    }
    let v = frames.value_at(time, value) * setup;
    if alpha == 1.0 {
        return if blend == MixBlend::Add {
            current + v - setup
        } else {
            v
        };
    }
    match (direction, blend) {
        (MixDirection::Out, MixBlend::Setup) => {
            setup + (v.abs() * math::signum(setup) - setup) * alpha
        }
        (MixDirection::Out, MixBlend::First | MixBlend::Replace) => {
            current + (v.abs() * math::signum(current) - current) * alpha
        }
        (MixDirection::In, MixBlend::Setup) => {
            let s = setup.abs() * math::signum(v);
            s + (v - s) * alpha
        }
        (MixDirection::In, MixBlend::First | MixBlend::Replace) => {
            let s = current.abs() * math::signum(v);
            s + (v - s) * alpha
        }
        (_, MixBlend::Add) => current + (v - setup) * alpha,
    }
}

/// Rotation keyed relative to setup, interpolated along the shorter arc between keys.
pub(crate) fn rotate_value(frames: &CurveFrames, time: f32) -> f32 {
    let i = frames.search(time);
    let raw = frames.value_from(i, time, 0);
    let keys = frames.frames();
    let next = i + frames.entries();
    if next >= keys.len() {
        return raw;
    }
    let (prev, target) = (keys[i + 1], keys[next + 1]);
    let span = target - prev;
    if span.abs() <= 180.0 {
        return raw;
    }
    let percent = (raw - prev) / span;
    prev + math::shortest_rotation_delta(span) * percent
}

pub(crate) fn apply_rotate(t: &BoneTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let Some(setup) = skeleton.data.bones.get(t.bone_index).map(|b| b.rotation) else {
        return warn_missing("bone", t.bone_index);
    };
    let Some(bone) = skeleton.bones.get_mut(t.bone_index) else {
        return warn_missing("bone", t.bone_index);
    };
    if !bone.active || t.frames.frame_count() == 0 {
        return;
    }
    if time < t.frames.start_time() {
        bone.rotation = before_first(blend, alpha, bone.rotation, setup);
        return;
    }
    let r = rotate_value(&t.frames, time);
    bone.rotation = match blend {
        MixBlend::Setup => setup + r * alpha,
        MixBlend::First | MixBlend::Replace => {
            let delta = math::shortest_rotation_delta(r + setup - bone.rotation);
            bone.rotation + delta * alpha
        }
        MixBlend::Add => bone.rotation + r * alpha,
    };
}

#[derive(Copy, Clone, Debug)]
enum BoneField {
    X,
    Y,
    ScaleX,
    ScaleY,
    ShearX,
    ShearY,
}

impl BoneField {
    fn setup(self, data: &crate::BoneData) -> f32 {
        match self {
            Self::X => data.x,
            Self::Y => data.y,
            Self::ScaleX => data.scale_x,
            Self::ScaleY => data.scale_y,
            Self::ShearX => data.shear_x,
            Self::ShearY => data.shear_y,
        }
    }

    fn get_mut(self, bone: &mut crate::Bone) -> &mut f32 {
        match self {
            Self::X => &mut bone.x,
            Self::Y => &mut bone.y,
            Self::ScaleX => &mut bone.scale_x,
            Self::ScaleY => &mut bone.scale_y,
            Self::ShearX => &mut bone.shear_x,
            Self::ShearY => &mut bone.shear_y,
        }
    }
}

fn apply_bone_relative(
    t: &BoneTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    field: BoneField,
    value: usize,
) {
    let Some(setup) = skeleton.data.bones.get(t.bone_index).map(|d| field.setup(d)) else {
        return warn_missing("bone", t.bone_index);
    };
    let Some(bone) = skeleton.bones.get_mut(t.bone_index) else {
        return warn_missing("bone", t.bone_index);
    };
    if !bone.active || t.frames.frame_count() == 0 {
        return;
    }
    let current = field.get_mut(bone);
    *current = relative_value(&t.frames, value, time, alpha, blend, *current, setup);
}

#[allow(clippy::too_many_arguments)]
fn apply_bone_scale(
    t: &BoneTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
    field: BoneField,
    value: usize,
) {
    let Some(setup) = skeleton.data.bones.get(t.bone_index).map(|d| field.setup(d)) else {
        return warn_missing("bone", t.bone_index);
    };
    let Some(bone) = skeleton.bones.get_mut(t.bone_index) else {
        return warn_missing("bone", t.bone_index);
    };
    if !bone.active || t.frames.frame_count() == 0 {
        return;
    }
    let current = field.get_mut(bone);
    *current = scale_value(&t.frames, value, time, alpha, blend, direction, *current, setup);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ColorChannels {
    Rgba,
    Rgb,
    Alpha,
    Rgba2,
    Rgb2,
}

fn lerp_channels(target: &mut [f32], setup: &[f32], keyed: &[f32], alpha: f32, blend: MixBlend) {
    if alpha == 1.0 {
        target.copy_from_slice(keyed);
        return;
    }
    if blend == MixBlend::Setup {
        target.copy_from_slice(setup);
    }
    for (t, &k) in target.iter_mut().zip(keyed) {
        *t += (k - *t) * alpha;
    }
}

fn apply_color(
    t: &SlotTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    channels: ColorChannels,
) {
    let Some(data) = skeleton.data.slots.get(t.slot_index) else {
        return warn_missing("slot", t.slot_index);
    };
    let (setup_light, setup_dark) = (data.color, data.dark_color.unwrap_or(Color::BLACK));
    let Some(slot) = skeleton.slots.get(t.slot_index) else {
        return warn_missing("slot", t.slot_index);
    };
    if !skeleton.bones.get(slot.bone()).is_some_and(|b| b.is_active()) || t.frames.frame_count() == 0 {
        return;
    }
    let slot = &mut skeleton.slots[t.slot_index];

    let mut light = [slot.color.r, slot.color.g, slot.color.b, slot.color.a];
    let mut dark = slot.dark_color.map(|c| [c.r, c.g, c.b]);
    let setup = [setup_light.r, setup_light.g, setup_light.b, setup_light.a];
    let setup2 = [setup_dark.r, setup_dark.g, setup_dark.b];
    // Channel ranges of `light` written by this timeline, and whether dark is keyed.
    let (light_range, has_dark) = match channels {
        ColorChannels::Rgba => (0..4, false),
        ColorChannels::Rgb => (0..3, false),
        ColorChannels::Alpha => (3..4, false),
        ColorChannels::Rgba2 => (0..4, true),
        ColorChannels::Rgb2 => (0..3, true),
    };

    if time < t.frames.start_time() {
        for c in light_range.clone() {
            light[c] = before_first(blend, alpha, light[c], setup[c]);
        }
        if let (true, Some(dark)) = (has_dark, dark.as_mut()) {
            for c in 0..3 {
                dark[c] = before_first(blend, alpha, dark[c], setup2[c]);
            }
        }
    } else {
        let i = t.frames.search(time);
        let light_count = light_range.len();
        let keyed = (0..t.frames.value_count())
            .map(|v| t.frames.value_from(i, time, v))
            .collect::<Vec<_>>();
        lerp_channels(
            &mut light[light_range.clone()],
            &setup[light_range.clone()],
            &keyed[..light_count],
            alpha,
            blend,
        );
        if let (true, Some(dark)) = (has_dark, dark.as_mut()) {
            lerp_channels(dark, &setup2, &keyed[light_count..light_count + 3], alpha, blend);
        }
    }

    slot.color = Color::new(light[0], light[1], light[2], light[3]);
    if let (Some(dark), Some(out)) = (dark, slot.dark_color.as_mut()) {
        out.r = dark[0];
        out.g = dark[1];
        out.b = dark[2];
    }
}

fn apply_attachment(
    t: &AttachmentTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let Some(slot) = skeleton.slots.get(t.slot_index) else {
        return warn_missing("slot", t.slot_index);
    };
    if !skeleton.bones.get(slot.bone()).is_some_and(|b| b.is_active()) || t.frames.is_empty() {
        return;
    }
    let setup = t.setup_attachment_name(skeleton).map(str::to_string);
    if direction == MixDirection::Out {
        if blend == MixBlend::Setup {
            t.set_attachment(skeleton, setup.as_deref());
        }
        return;
    }
    if time < t.frames[0] {
        if matches!(blend, MixBlend::Setup | MixBlend::First) {
            t.set_attachment(skeleton, setup.as_deref());
        }
        return;
    }
    let name = t.attachment_names[search1(&t.frames, time)].clone();
    t.set_attachment(skeleton, name.as_deref());
}

fn apply_deform(t: &DeformTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, mut blend: MixBlend) {
    let Some(slot) = skeleton.slots.get(t.slot_index) else {
        return warn_missing("slot", t.slot_index);
    };
    if !skeleton.bones.get(slot.bone()).is_some_and(|b| b.is_active()) {
        return;
    }
    let Some(attachment) = slot.attachment().cloned() else {
        return;
    };
    let Some(vertex) = attachment.as_vertex() else {
        return;
    };
    if vertex.deform_attachment_id != t.attachment_id {
        return;
    }
    let Some(vertex_count) = t.vertices.first().map(Vec::len) else {
        return;
    };
    let times = t.frames.frames();
    if times.is_empty() {
        return;
    }
    let weighted = vertex.bones.is_some();
    let setup_vertices = vertex.vertices.as_slice();
    // Unweighted keys hold positions, so additive blends add the offset from setup.
    let setup_at = |i: usize| {
        if weighted {
            0.0
        } else {
            setup_vertices.get(i).copied().unwrap_or(0.0)
        }
    };

    let deform = &mut skeleton.slots[t.slot_index].deform;
    if deform.is_empty() {
        blend = MixBlend::Setup;
    }

    if time < times[0] {
        match blend {
            MixBlend::Setup => deform.clear(),
            MixBlend::First => {
                if alpha == 1.0 {
                    deform.clear();
                    return;
                }
                deform.resize(vertex_count, 0.0);
                for (i, d) in deform.iter_mut().enumerate() {
                    *d += (setup_at(i) - *d) * alpha;
                }
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    deform.resize(vertex_count, 0.0);
    let last = times.len() - 1;
    let (prev, next, percent) = if time >= times[last] {
        (&t.vertices[last], &t.vertices[last], 0.0)
    } else {
        let frame = search1(times, time);
        (
            &t.vertices[frame],
            &t.vertices[frame + 1],
            t.frames.percent(time, frame),
        )
    };

    for (i, d) in deform.iter_mut().enumerate() {
        let p = prev.get(i).copied().unwrap_or(0.0);
        let n = next.get(i).copied().unwrap_or(0.0);
        let v = p + (n - p) * percent;
        *d = if alpha == 1.0 {
            match blend {
                MixBlend::Add => *d + v - setup_at(i),
                _ => v,
            }
        } else {
            match blend {
                MixBlend::Setup => {
                    let setup = setup_at(i);
                    setup + (v - setup) * alpha
                }
                MixBlend::First | MixBlend::Replace => *d + (v - *d) * alpha,
                MixBlend::Add => *d + (v - setup_at(i)) * alpha,
            }
        };
    }
}

fn apply_draw_order(
    t: &DrawOrderTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let slot_count = skeleton.slots.len();
    let setup_order = |skeleton: &mut Skeleton| skeleton.draw_order = (0..slot_count).collect();
    if t.frames.is_empty() {
        return;
    }
    if direction == MixDirection::Out {
        if blend == MixBlend::Setup {
            setup_order(skeleton);
        }
        return;
    }
    if time < t.frames[0] {
        if matches!(blend, MixBlend::Setup | MixBlend::First) {
            setup_order(skeleton);
        }
        return;
    }
    match &t.draw_orders[search1(&t.frames, time)] {
        None => setup_order(skeleton),
        Some(order) if order.len() == slot_count && order.iter().all(|&i| i < slot_count) => {
            skeleton.draw_order.clone_from(order);
        }
        Some(_) => log::warn!("draw order key does not match {slot_count} slots; skipped"),
    }
}

fn apply_ik(
    t: &ConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let Some(constraint) = skeleton.ik_constraints.get_mut(t.constraint_index) else {
        return warn_missing("IK constraint", t.constraint_index);
    };
    if !constraint.active || t.frames.frame_count() == 0 {
        return;
    }
    let Some(data) = skeleton.data.ik_constraints.get(constraint.data_index()) else {
        return;
    };

    if time < t.frames.start_time() {
        match blend {
            MixBlend::Setup => constraint.set_to_setup_pose(data),
            MixBlend::First => {
                constraint.mix += (data.mix - constraint.mix) * alpha;
                constraint.softness += (data.softness - constraint.softness) * alpha;
                constraint.bend_direction = data.bend_direction;
                constraint.compress = data.compress;
                constraint.stretch = data.stretch;
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let i = t.frames.search(time);
    let mix = t.frames.value_from(i, time, 0);
    let softness = t.frames.value_from(i, time, 1);
    let keys = t.frames.frames();
    let keyed_flags = |constraint: &mut crate::IkConstraint| {
        constraint.bend_direction = if keys[i + 3] < 0.0 { -1 } else { 1 };
        constraint.compress = keys[i + 4] != 0.0;
        constraint.stretch = keys[i + 5] != 0.0;
    };

    if blend == MixBlend::Setup {
        constraint.mix = data.mix + (mix - data.mix) * alpha;
        constraint.softness = data.softness + (softness - data.softness) * alpha;
        if direction == MixDirection::Out {
            constraint.bend_direction = data.bend_direction;
            constraint.compress = data.compress;
            constraint.stretch = data.stretch;
        } else {
            keyed_flags(constraint);
        }
    } else {
        constraint.mix += (mix - constraint.mix) * alpha;
        constraint.softness += (softness - constraint.softness) * alpha;
        if direction == MixDirection::In {
            keyed_flags(constraint);
        }
    }
}

/// Blends `current` toward keyed `values`, from the setup values for [`MixBlend::Setup`].
fn mix_values(
    frames: &CurveFrames,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    current: &mut [f32],
    setup: &[f32],
) {
    if time < frames.start_time() {
        for (c, &s) in current.iter_mut().zip(setup) {
            *c = before_first(blend, alpha, *c, s);
        }
        return;
    }
    let i = frames.search(time);
    for (v, (c, &s)) in current.iter_mut().zip(setup).enumerate() {
        let keyed = frames.value_from(i, time, v);
        *c = if blend == MixBlend::Setup {
            s + (keyed - s) * alpha
        } else {
            *c + (keyed - *c) * alpha
        };
    }
}

fn apply_transform_mix(
    t: &ConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton.transform_constraints.get_mut(t.constraint_index) else {
        return warn_missing("transform constraint", t.constraint_index);
    };
    if !constraint.active || t.frames.frame_count() == 0 {
        return;
    }
    let Some(data) = skeleton.data.transform_constraints.get(constraint.data_index()) else {
        return;
    };
    let setup = [data.rotate_mix, data.translate_mix, data.scale_mix, data.shear_mix];
    let mut current = [
        constraint.rotate_mix,
        constraint.translate_mix,
        constraint.scale_mix,
        constraint.shear_mix,
    ];
    mix_values(&t.frames, time, alpha, blend, &mut current, &setup);
    [
        constraint.rotate_mix,
        constraint.translate_mix,
        constraint.scale_mix,
        constraint.shear_mix,
    ] = current;
}

fn apply_path_value(
    t: &ConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    spacing: bool,
) {
    let Some(constraint) = skeleton.path_constraints.get_mut(t.constraint_index) else {
        return warn_missing("path constraint", t.constraint_index);
    };
    if !constraint.active || t.frames.frame_count() == 0 {
        return;
    }
    let Some(data) = skeleton.data.path_constraints.get(constraint.data_index()) else {
        return;
    };
    if spacing {
        constraint.spacing =
            absolute_value(&t.frames, 0, time, alpha, blend, constraint.spacing, data.spacing);
    } else {
        constraint.position =
            absolute_value(&t.frames, 0, time, alpha, blend, constraint.position, data.position);
    }
}

fn apply_path_mix(t: &ConstraintTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let Some(constraint) = skeleton.path_constraints.get_mut(t.constraint_index) else {
        return warn_missing("path constraint", t.constraint_index);
    };
    if !constraint.active || t.frames.frame_count() == 0 {
        return;
    }
    let Some(data) = skeleton.data.path_constraints.get(constraint.data_index()) else {
        return;
    };
    let setup = [data.rotate_mix, data.translate_mix];
    let mut current = [constraint.rotate_mix, constraint.translate_mix];
    mix_values(&t.frames, time, alpha, blend, &mut current, &setup);
    [constraint.rotate_mix, constraint.translate_mix] = current;
}
