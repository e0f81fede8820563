use crate::{IkConstraintData, Skeleton, TransformMode, math};

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub mix: f32,
    pub softness: f32,
    pub active: bool,
}

impl IkConstraint {
    pub(crate) fn new(data_index: usize, data: &IkConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            bend_direction: data.bend_direction,
            compress: data.compress,
            stretch: data.stretch,
            mix: data.mix,
            softness: data.softness,
            active: true,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &IkConstraintData) {
        self.mix = data.mix;
        self.softness = data.softness;
        self.bend_direction = data.bend_direction;
        self.compress = data.compress;
        self.stretch = data.stretch;
    }
}

impl Skeleton {
    pub(crate) fn update_ik_constraint(&mut self, index: usize) {
        let Some(ik) = self.ik_constraints.get(index) else {
            return;
        };
        let Some(target) = self.bones.get(ik.target) else {
            return;
        };
        let (target_x, target_y) = (target.world_x, target.world_y);
        let uniform = self.data.ik_constraints[ik.data_index].uniform;
        let (compress, stretch, bend, softness, mix) =
            (ik.compress, ik.stretch, ik.bend_direction, ik.softness, ik.mix);

        match *ik.bones.as_slice() {
            [bone] => {
                if mix == 0.0 {
                    return;
                }
                self.apply_ik_one(bone, target_x, target_y, compress, stretch, uniform, mix);
            }
            [parent, child] => {
                if mix == 0.0 {
                    // The child is only sorted before this constraint, so it still needs a pose.
                    self.update_bone_world_transform(child);
                    return;
                }
                self.apply_ik_two(
                    parent, child, target_x, target_y, bend, stretch, uniform, softness, mix,
                );
            }
            _ => {}
        }
    }

    /// Rotates a single bone so it points at the target, in world space. With `compress` or
    /// `stretch` the bone is scaled along its length to reach the target; `uniform` scales both
    /// axes.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ik_one(
        &mut self,
        bone_index: usize,
        target_x: f32,
        target_y: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
        alpha: f32,
    ) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let Some(parent) = bone.parent_index().and_then(|p| self.bones.get(p)) else {
            return;
        };
        let (pa, mut pb, pc, mut pd) = (parent.a, parent.b, parent.c, parent.d);
        let (pwx, pwy) = (parent.world_x, parent.world_y);

        let mut rotation_ik = -bone.ashear_x - bone.arotation;
        let (mut tx, mut ty);
        match bone.transform_mode {
            TransformMode::OnlyTranslation => {
                tx = target_x - bone.world_x;
                ty = target_y - bone.world_y;
            }
            mode => {
                if mode == TransformMode::NoRotationOrReflection {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc);
                    let sa = pa / self.scale_x;
                    let sc = pc / self.scale_y;
                    pb = -sc * s * self.scale_x;
                    pd = sa * s * self.scale_y;
                    rotation_ik += math::atan2_deg(sc, sa);
                }
                let x = target_x - pwx;
                let y = target_y - pwy;
                let d = pa * pd - pb * pc;
                tx = (x * pd - y * pb) / d - bone.ax;
                ty = (y * pa - x * pc) / d - bone.ay;
            }
        }
        rotation_ik += math::atan2_deg(ty, tx);
        if bone.ascale_x < 0.0 {
            rotation_ik += 180.0;
        }
        let rotation_ik = math::wrap_180(rotation_ik);

        let (mut sx, mut sy) = (bone.ascale_x, bone.ascale_y);
        if compress || stretch {
            if matches!(
                bone.transform_mode,
                TransformMode::NoScale | TransformMode::NoScaleOrReflection
            ) {
                tx = target_x - bone.world_x;
                ty = target_y - bone.world_y;
            }
            let length = self.data.bones[bone.data_index()].length;
            let b = length * sx;
            let dd = (tx * tx + ty * ty).sqrt();
            if b > 1.0e-4 && ((compress && dd < b) || (stretch && dd > b)) {
                let s = (dd / b - 1.0) * alpha + 1.0;
                sx *= s;
                if uniform {
                    sy *= s;
                }
            }
        }

        let (ax, ay, arotation, ashear_x, ashear_y) =
            (bone.ax, bone.ay, bone.arotation, bone.ashear_x, bone.ashear_y);
        self.update_bone_world_transform_with(
            bone_index,
            ax,
            ay,
            arotation + rotation_ik * alpha,
            sx,
            sy,
            ashear_x,
            ashear_y,
        );
    }

    /// Solves a parent/child chain so the child's tip reaches the target. `bend_direction` picks
    /// the elbow side and `softness` slows the chain down as it approaches full extension.
    ///
    /// With non-uniform parent scale the elbow lies on an ellipse. When the quadratic for it has
    /// no usable root the closer of the nearest and farthest reachable points is taken, measured
    /// against the mean of their squared distances. That choice is an approximation kept for
    /// compatibility with existing rigs.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ik_two(
        &mut self,
        parent_index: usize,
        child_index: usize,
        target_x: f32,
        target_y: f32,
        bend_direction: i32,
        stretch: bool,
        uniform: bool,
        softness: f32,
        alpha: f32,
    ) {
        if alpha == 0.0 {
            self.update_bone_world_transform(child_index);
            return;
        }
        let (Some(parent), Some(child)) = (self.bones.get(parent_index), self.bones.get(child_index))
        else {
            return;
        };
        let Some(pp) = parent.parent_index().and_then(|p| self.bones.get(p)) else {
            return;
        };
        let bend_dir = if bend_direction < 0 { -1.0 } else { 1.0 };

        let (px, py) = (parent.ax, parent.ay);
        let mut psx = parent.ascale_x;
        let mut psy = parent.ascale_y;
        let mut sx = psx;
        let mut sy = psy;
        let mut csx = child.ascale_x;
        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0, -1.0)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0
        } else {
            0.0
        };

        let cx = child.ax;
        let u = (psx - psy).abs() <= 1.0e-4;
        let (cy, cwx, cwy) = if !u || stretch {
            (0.0, parent.a * cx + parent.world_x, parent.c * cx + parent.world_y)
        } else {
            let cy = child.ay;
            (
                cy,
                parent.a * cx + parent.b * cy + parent.world_x,
                parent.c * cx + parent.d * cy + parent.world_y,
            )
        };

        let (a, b, c, d) = (pp.a, pp.b, pp.c, pp.d);
        let (ppx, ppy) = (pp.world_x, pp.world_y);
        let id = 1.0 / (a * d - b * c);
        let x = cwx - ppx;
        let y = cwy - ppy;
        let dx = (x * d - y * b) * id - px;
        let dy = (y * a - x * c) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = self.data.bones[child.data_index()].length * csx;

        let (parent_rotation, parent_ascale_y) = (parent.arotation, parent.ascale_y);
        let (child_rotation, child_sx, child_sy, child_shear_x, child_shear_y) = (
            child.arotation,
            child.ascale_x,
            child.ascale_y,
            child.ashear_x,
            child.ashear_y,
        );

        if l1 < 1.0e-4 {
            self.apply_ik_one(parent_index, target_x, target_y, false, stretch, false, alpha);
            self.update_bone_world_transform_with(
                child_index,
                cx,
                cy,
                0.0,
                child_sx,
                child_sy,
                child_shear_x,
                child_shear_y,
            );
            return;
        }

        let x = target_x - ppx;
        let y = target_y - ppy;
        let mut tx = (x * d - y * b) * id - px;
        let mut ty = (y * a - x * c) * id - py;
        let mut dd = tx * tx + ty * ty;
        if softness != 0.0 {
            let softness = softness * psx * (csx + 1.0) / 2.0;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 {
                let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                p = (sd - softness * (1.0 - p * p)) / td;
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let (a1, a2);
        if u {
            l2 *= psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            if cos < -1.0 {
                cos = -1.0;
            } else if cos > 1.0 {
                cos = 1.0;
                if stretch {
                    let s = ((dd.sqrt() / (l1 + l2)) - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
            }
            a2 = cos.acos() * bend_dir;
            let a = l1 + l2 * cos;
            let b = l2 * a2.sin();
            a1 = (ty * a - tx * b).atan2(tx * a + ty * b);
        } else {
            (a1, a2) = solve_ellipse(l1, psx * l2, psy * l2, psx, psy, tx, ty, dd, bend_dir);
        }

        let os = cy.atan2(cx) * s2;
        let a1 = math::wrap_180((a1 - os) * math::RAD_DEG + os1 - parent_rotation);
        self.update_bone_world_transform_with(
            parent_index,
            px,
            py,
            parent_rotation + a1 * alpha,
            sx,
            if uniform { sy } else { parent_ascale_y },
            0.0,
            0.0,
        );
        let a2 = math::wrap_180(
            ((a2 + os) * math::RAD_DEG - child_shear_x) * s2 + os2 - child_rotation,
        );
        self.update_bone_world_transform_with(
            child_index,
            cx,
            cy,
            child_rotation + a2 * alpha,
            child_sx,
            child_sy,
            child_shear_x,
            child_shear_y,
        );
    }
}

/// Two-bone solve for a non-uniformly scaled parent. Returns the parent and child angles in
/// radians, before offsets.
#[allow(clippy::too_many_arguments)]
fn solve_ellipse(
    l1: f32,
    a: f32,
    b: f32,
    psx: f32,
    psy: f32,
    tx: f32,
    ty: f32,
    dd: f32,
    bend_dir: f32,
) -> (f32, f32) {
    let aa = a * a;
    let bb = b * b;
    let ta = ty.atan2(tx);
    let c0 = bb * l1 * l1 + aa * dd - aa * bb;
    let c1 = -2.0 * bb * l1;
    let c2 = bb - aa;
    let d = c1 * c1 - 4.0 * c2 * c0;
    if d >= 0.0 {
        let mut q = d.sqrt();
        if c1 < 0.0 {
            q = -q;
        }
        q = -(c1 + q) / 2.0;
        let r0 = q / c2;
        let r1 = c0 / q;
        let r = if r0.abs() < r1.abs() { r0 } else { r1 };
        if r * r <= dd {
            let y = (dd - r * r).sqrt() * bend_dir;
            return (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
        }
    }

    let mut min_angle = math::PI;
    let mut min_x = l1 - a;
    let mut min_dist = min_x * min_x;
    let mut min_y = 0.0f32;
    let mut max_angle = 0.0f32;
    let mut max_x = l1 + a;
    let mut max_dist = max_x * max_x;
    let mut max_y = 0.0f32;
    let c = -a * l1 / (aa - bb);
    if (-1.0..=1.0).contains(&c) {
        let c = c.acos();
        let x = a * c.cos() + l1;
        let y = b * c.sin();
        let d = x * x + y * y;
        if d < min_dist {
            min_angle = c;
            min_dist = d;
            min_x = x;
            min_y = y;
        }
        if d > max_dist {
            max_angle = c;
            max_dist = d;
            max_x = x;
            max_y = y;
        }
    }
    if dd <= (min_dist + max_dist) / 2.0 {
        (ta - (min_y * bend_dir).atan2(min_x), min_angle * bend_dir)
    } else {
        (ta - (max_y * bend_dir).atan2(max_x), max_angle * bend_dir)
    }
}
