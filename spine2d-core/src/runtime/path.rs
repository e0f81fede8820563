use std::sync::Arc;

use crate::{
    Attachment, Bone, PathAttachment, PathConstraintData, PositionMode, RotateMode, Skeleton, Slot,
    SpacingMode, math,
};

const EPSILON: f32 = 1.0e-5;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum PrevCurve {
    None,
    Before,
    After,
    Curve(usize),
}

/// Buffers reused between updates so solving a path does not allocate every frame.
#[derive(Clone, Debug, Default)]
struct PathScratch {
    spaces: Vec<f32>,
    positions: Vec<f32>,
    world: Vec<f32>,
    curves: Vec<f32>,
    lengths: Vec<f32>,
    segments: [f32; 10],
}

#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot whose path attachment the bones follow.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub rotate_mix: f32,
    pub translate_mix: f32,
    pub active: bool,
    scratch: PathScratch,
}

impl PathConstraint {
    pub(crate) fn new(data_index: usize, data: &PathConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            position: data.position,
            spacing: data.spacing,
            rotate_mix: data.rotate_mix,
            translate_mix: data.translate_mix,
            active: true,
            scratch: PathScratch::default(),
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &PathConstraintData) {
        self.position = data.position;
        self.spacing = data.spacing;
        self.rotate_mix = data.rotate_mix;
        self.translate_mix = data.translate_mix;
    }
}

impl Skeleton {
    pub(crate) fn update_path_constraint(&mut self, index: usize) {
        let Some(constraint) = self.path_constraints.get(index) else {
            return;
        };
        let Some(attachment) = self
            .slots
            .get(constraint.target)
            .and_then(Slot::attachment)
            .map(Arc::clone)
        else {
            return;
        };
        let Attachment::Path(path) = attachment.as_ref() else {
            return;
        };

        let (rotate_mix, translate_mix) = (constraint.rotate_mix, constraint.translate_mix);
        let rotate = rotate_mix > 0.0;
        if translate_mix <= 0.0 && !rotate {
            return;
        }

        let skeleton_data = self.data.clone();
        let data = &skeleton_data.path_constraints[constraint.data_index];
        let tangents = data.rotate_mode == RotateMode::Tangent;
        let scale = data.rotate_mode == RotateMode::ChainScale;
        let bones = constraint.bones.clone();
        let bone_count = bones.len();
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };
        let spacing = constraint.spacing;
        let position = constraint.position;
        let target = constraint.target;

        let mut scratch = std::mem::take(&mut self.path_constraints[index].scratch);
        scratch.spaces.clear();
        scratch.spaces.resize(spaces_count, 0.0);
        scratch.lengths.clear();
        if scale {
            scratch.lengths.resize(bone_count, 0.0);
        }

        let setup_length = |bone: &Bone| {
            skeleton_data
                .bones
                .get(bone.data_index())
                .map(|d| d.length)
                .unwrap_or(0.0)
        };
        match data.spacing_mode {
            SpacingMode::Percent => {
                if scale {
                    for (i, &bone_index) in bones.iter().enumerate() {
                        let bone = &self.bones[bone_index];
                        let setup = setup_length(bone);
                        let (x, y) = (setup * bone.a, setup * bone.c);
                        scratch.lengths[i] = (x * x + y * y).sqrt();
                    }
                }
                for space in scratch.spaces.iter_mut().skip(1) {
                    *space = spacing;
                }
            }
            SpacingMode::Proportional => {
                let mut sum = 0.0f32;
                for i in 0..spaces_count.saturating_sub(1) {
                    let bone = &self.bones[bones[i]];
                    let setup = setup_length(bone);
                    if setup < EPSILON {
                        if scale {
                            scratch.lengths[i] = 0.0;
                        }
                        scratch.spaces[i + 1] = spacing;
                    } else {
                        let (x, y) = (setup * bone.a, setup * bone.c);
                        let length = (x * x + y * y).sqrt();
                        if scale {
                            scratch.lengths[i] = length;
                        }
                        scratch.spaces[i + 1] = length;
                        sum += length;
                    }
                }
                if sum > 0.0 {
                    let factor = spaces_count as f32 / sum * spacing;
                    for space in scratch.spaces.iter_mut().skip(1) {
                        *space *= factor;
                    }
                }
            }
            mode => {
                let length_spacing = mode == SpacingMode::Length;
                for i in 0..spaces_count.saturating_sub(1) {
                    let bone = &self.bones[bones[i]];
                    let setup = setup_length(bone);
                    if setup < EPSILON {
                        if scale {
                            scratch.lengths[i] = 0.0;
                        }
                        scratch.spaces[i + 1] = 0.0;
                    } else {
                        let (x, y) = (setup * bone.a, setup * bone.c);
                        let length = (x * x + y * y).sqrt();
                        if scale {
                            scratch.lengths[i] = length;
                        }
                        let space = if length_spacing { setup + spacing } else { spacing };
                        scratch.spaces[i + 1] = space * length / setup;
                    }
                }
            }
        }

        compute_world_positions(
            &self.bones,
            &self.slots[target],
            path,
            &mut scratch,
            spaces_count,
            tangents,
            position,
            data.position_mode,
            data.spacing_mode,
        );

        let positions = &scratch.positions;
        if positions.len() < spaces_count * 3 + 2 {
            self.path_constraints[index].scratch = scratch;
            return;
        }
        let (mut bone_x, mut bone_y) = (positions[0], positions[1]);
        let mut offset_rotation = data.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            data.rotate_mode == RotateMode::Chain
        } else {
            let p = &self.bones[self.slots[target].bone()];
            offset_rotation *= if p.a * p.d - p.b * p.c > 0.0 {
                math::DEG_RAD
            } else {
                -math::DEG_RAD
            };
            false
        };

        for (i, &bone_index) in bones.iter().enumerate() {
            let p = 3 * (i + 1);
            let bone_length = setup_length(&self.bones[bone_index]);
            let bone = &mut self.bones[bone_index];
            bone.world_x += (bone_x - bone.world_x) * translate_mix;
            bone.world_y += (bone_y - bone.world_y) * translate_mix;
            let (x, y) = (positions[p], positions[p + 1]);
            let (dx, dy) = (x - bone_x, y - bone_y);
            if scale {
                let length = scratch.lengths[i];
                if length != 0.0 {
                    let s = ((dx * dx + dy * dy).sqrt() / length - 1.0) * rotate_mix + 1.0;
                    bone.a *= s;
                    bone.c *= s;
                }
            }
            bone_x = x;
            bone_y = y;
            if rotate {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let mut r = if tangents {
                    positions[p - 1]
                } else if scratch.spaces[i + 1] == 0.0 {
                    positions[p + 2]
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a);
                if tip {
                    let (sin, cos) = r.sin_cos();
                    bone_x += (bone_length * (cos * a - sin * c) - dx) * rotate_mix;
                    bone_y += (bone_length * (sin * a + cos * c) - dy) * rotate_mix;
                } else {
                    r += offset_rotation;
                }
                let r = math::wrap_pi(r) * rotate_mix;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }
            self.update_applied_transform(bone_index);
        }

        self.path_constraints[index].scratch = scratch;
    }
}

/// Samples `spaces_count` points along the path into `scratch.positions` as `(x, y, rotation)`
/// triples, starting at `position` and advancing by `scratch.spaces`.
#[allow(clippy::too_many_arguments)]
fn compute_world_positions(
    bones: &[Bone],
    slot: &Slot,
    path: &PathAttachment,
    scratch: &mut PathScratch,
    spaces_count: usize,
    tangents: bool,
    mut position: f32,
    position_mode: PositionMode,
    spacing_mode: SpacingMode,
) {
    let PathScratch {
        spaces,
        positions: out,
        world,
        curves,
        segments,
        ..
    } = scratch;
    let closed = path.closed;
    let mut vertices_length = path.vertex.world_vertices_length;
    out.clear();
    out.resize(spaces_count * 3 + 2, 0.0);
    if vertices_length < 6 || spaces_count == 0 {
        return;
    }
    let mut curve_count = vertices_length / 6;
    let mut prev_curve = PrevCurve::None;

    if !path.constant_speed {
        let lengths = path.lengths.as_slice();
        let Some(count) = curve_count.checked_sub(if closed { 1 } else { 2 }) else {
            return;
        };
        curve_count = count;
        let Some(&path_length) = lengths.get(curve_count) else {
            return;
        };
        if position_mode == PositionMode::Percent {
            position *= path_length;
        }
        let multiplier = match spacing_mode {
            SpacingMode::Percent => path_length,
            SpacingMode::Proportional => path_length / spaces_count as f32,
            _ => 1.0,
        };

        world.clear();
        world.resize(8, 0.0);
        let mut curve = 0usize;
        for i in 0..spaces_count {
            let o = i * 3;
            let space = spaces[i] * multiplier;
            position += space;
            let mut p = position;

            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                if prev_curve != PrevCurve::Before {
                    prev_curve = PrevCurve::Before;
                    path.vertex.compute_world_vertices(bones, slot, 2, 4, world, 0, 2);
                }
                add_before_position(p, world, 0, out, o);
                continue;
            } else if p > path_length {
                if prev_curve != PrevCurve::After {
                    prev_curve = PrevCurve::After;
                    path.vertex.compute_world_vertices(
                        bones,
                        slot,
                        vertices_length - 6,
                        4,
                        world,
                        0,
                        2,
                    );
                }
                add_after_position(p - path_length, world, 0, out, o);
                continue;
            }

            while curve < curve_count && p > lengths[curve] {
                curve += 1;
            }
            let length = lengths[curve];
            if curve == 0 {
                p /= length;
            } else {
                let prev = lengths[curve - 1];
                p = (p - prev) / (length - prev);
            }

            if prev_curve != PrevCurve::Curve(curve) {
                prev_curve = PrevCurve::Curve(curve);
                if closed && curve == curve_count {
                    path.vertex.compute_world_vertices(
                        bones,
                        slot,
                        vertices_length - 4,
                        4,
                        world,
                        0,
                        2,
                    );
                    path.vertex.compute_world_vertices(bones, slot, 0, 4, world, 4, 2);
                } else {
                    path.vertex.compute_world_vertices(bones, slot, curve * 6 + 2, 8, world, 0, 2);
                }
            }
            add_curve_position(
                p,
                [world[0], world[1], world[2], world[3], world[4], world[5], world[6], world[7]],
                out,
                o,
                tangents || (i > 0 && space == 0.0),
            );
        }
        return;
    }

    if closed {
        vertices_length += 2;
        world.clear();
        world.resize(vertices_length, 0.0);
        path.vertex
            .compute_world_vertices(bones, slot, 2, vertices_length - 4, world, 0, 2);
        path.vertex
            .compute_world_vertices(bones, slot, 0, 2, world, vertices_length - 4, 2);
        world[vertices_length - 2] = world[0];
        world[vertices_length - 1] = world[1];
    } else {
        curve_count -= 1;
        vertices_length -= 4;
        world.clear();
        world.resize(vertices_length, 0.0);
        path.vertex
            .compute_world_vertices(bones, slot, 2, vertices_length, world, 0, 2);
    }
    if curve_count == 0 {
        return;
    }

    curves.clear();
    curves.resize(curve_count, 0.0);
    let mut path_length = 0.0f32;
    let (mut x1, mut y1) = (world[0], world[1]);
    for i in 0..curve_count {
        let w = 2 + i * 6;
        let (cx1, cy1, cx2, cy2, x2, y2) = (
            world[w],
            world[w + 1],
            world[w + 2],
            world[w + 3],
            world[w + 4],
            world[w + 5],
        );
        let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
        let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
        let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
        let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
        let mut ddfx = tmpx * 2.0 + dddfx;
        let mut ddfy = tmpy * 2.0 + dddfy;
        let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.166_666_67;
        let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.166_666_67;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        dfx += ddfx;
        dfy += ddfy;
        ddfx += dddfx;
        ddfy += dddfy;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        dfx += ddfx;
        dfy += ddfy;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        dfx += ddfx + dddfx;
        dfy += ddfy + dddfy;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        curves[i] = path_length;
        x1 = x2;
        y1 = y2;
    }

    if position_mode == PositionMode::Percent {
        position *= path_length;
    } else if let Some(&setup_length) = path.lengths.get(curve_count - 1) {
        if setup_length != 0.0 {
            position *= path_length / setup_length;
        }
    }
    let multiplier = match spacing_mode {
        SpacingMode::Percent => path_length,
        SpacingMode::Proportional => path_length / spaces_count as f32,
        _ => 1.0,
    };

    let mut curve_length = 0.0f32;
    let mut curve = 0usize;
    let mut segment = 0usize;
    let mut points = [0.0f32; 8];
    for i in 0..spaces_count {
        let o = i * 3;
        let space = spaces[i] * multiplier;
        position += space;
        let mut p = position;

        if closed {
            p = p.rem_euclid(path_length);
            curve = 0;
        } else if p < 0.0 {
            add_before_position(p, world, 0, out, o);
            continue;
        } else if p > path_length {
            add_after_position(p - path_length, world, vertices_length - 4, out, o);
            continue;
        }

        while curve + 1 < curve_count && p > curves[curve] {
            curve += 1;
        }
        let length = curves[curve];
        if curve == 0 {
            p /= length;
        } else {
            let prev = curves[curve - 1];
            p = (p - prev) / (length - prev);
        }

        if prev_curve != PrevCurve::Curve(curve) {
            prev_curve = PrevCurve::Curve(curve);
            let ii = curve * 6;
            points.copy_from_slice(&world[ii..ii + 8]);
            let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = points;
            let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
            let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
            let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
            let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
            let mut ddfx = tmpx * 2.0 + dddfx;
            let mut ddfy = tmpy * 2.0 + dddfy;
            let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.166_666_67;
            let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.166_666_67;
            curve_length = (dfx * dfx + dfy * dfy).sqrt();
            segments[0] = curve_length;
            for s in segments.iter_mut().take(8).skip(1) {
                dfx += ddfx;
                dfy += ddfy;
                ddfx += dddfx;
                ddfy += dddfy;
                curve_length += (dfx * dfx + dfy * dfy).sqrt();
                *s = curve_length;
            }
            dfx += ddfx;
            dfy += ddfy;
            curve_length += (dfx * dfx + dfy * dfy).sqrt();
            segments[8] = curve_length;
            dfx += ddfx + dddfx;
            dfy += ddfy + dddfy;
            curve_length += (dfx * dfx + dfy * dfy).sqrt();
            segments[9] = curve_length;
            segment = 0;
        }

        p *= curve_length;
        while segment < 9 && p > segments[segment] {
            segment += 1;
        }
        let length = segments[segment];
        if segment == 0 {
            p /= length;
        } else {
            let prev = segments[segment - 1];
            p = segment as f32 + (p - prev) / (length - prev);
        }
        add_curve_position(
            p * 0.1,
            points,
            out,
            o,
            tangents || (i > 0 && space == 0.0),
        );
    }
}

fn add_before_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let (x1, y1) = (temp[i], temp[i + 1]);
    let r = (temp[i + 3] - y1).atan2(temp[i + 2] - x1);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let (x1, y1) = (temp[i + 2], temp[i + 3]);
    let r = (y1 - temp[i + 1]).atan2(x1 - temp[i]);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

/// Evaluates the cubic Bezier `[x1, y1, cx1, cy1, cx2, cy2, x2, y2]` at `p`.
fn add_curve_position(p: f32, curve: [f32; 8], out: &mut [f32], o: usize, tangents: bool) {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = curve;
    if p < EPSILON || p.is_nan() {
        out[o] = x1;
        out[o + 1] = y1;
        out[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    out[o] = x;
    out[o + 1] = y;
    if tangents {
        out[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt)).atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt))
        };
    }
}
