use crate::{BoneData, Skeleton, TransformMode, math};

/// Per-instance bone pose.
///
/// `x..shear_y` is the local pose written by animations, `ax..ashear_y` the local pose last used
/// to compute the world transform, and `a, b, c, d, world_x, world_y` the world transform itself.
#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,
    pub(crate) children: Vec<usize>,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,

    pub(crate) transform_mode: TransformMode,
    pub(crate) active: bool,
}

impl Bone {
    pub(crate) fn new(data: &BoneData) -> Self {
        let mut bone = Self {
            data_index: data.index,
            parent: data.parent,
            children: Vec::new(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            ax: 0.0,
            ay: 0.0,
            arotation: 0.0,
            ascale_x: 1.0,
            ascale_y: 1.0,
            ashear_x: 0.0,
            ashear_y: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
            transform_mode: data.transform_mode,
            active: true,
        };
        bone.set_to_setup_pose(data);
        bone
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// False when the bone is skin-required and not part of the current skin.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
        self.shear_x = data.shear_x;
        self.shear_y = data.shear_y;
        self.transform_mode = data.transform_mode;
    }

    pub fn world_rotation_x(&self) -> f32 {
        math::atan2_deg(self.c, self.a)
    }

    pub fn world_rotation_y(&self) -> f32 {
        math::atan2_deg(self.d, self.b)
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> (f32, f32) {
        let inv_det = 1.0 / (self.a * self.d - self.b * self.c);
        let x = world_x - self.world_x;
        let y = world_y - self.world_y;
        (
            x * self.d * inv_det - y * self.b * inv_det,
            y * self.a * inv_det - x * self.c * inv_det,
        )
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> (f32, f32) {
        (
            local_x * self.a + local_y * self.b + self.world_x,
            local_x * self.c + local_y * self.d + self.world_y,
        )
    }

    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let sin = math::sin_deg(world_rotation);
        let cos = math::cos_deg(world_rotation);
        math::atan2_deg(self.a * sin - self.c * cos, self.d * cos - self.b * sin) + self.rotation
            - self.shear_x
    }

    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let local_rotation = local_rotation - (self.rotation - self.shear_x);
        let sin = math::sin_deg(local_rotation);
        let cos = math::cos_deg(local_rotation);
        math::atan2_deg(
            cos * self.c + sin * self.d,
            cos * self.a + sin * self.b,
        )
    }

    /// Rotates the world transform by `degrees`. The applied transform is stale afterwards; call
    /// [`Skeleton::update_applied_transform`] before anything reads it.
    pub fn rotate_world(&mut self, degrees: f32) {
        let cos = math::cos_deg(degrees);
        let sin = math::sin_deg(degrees);
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = cos * a - sin * c;
        self.b = cos * b - sin * d;
        self.c = sin * a + cos * c;
        self.d = sin * b + cos * d;
    }
}

#[derive(Copy, Clone, Debug)]
struct ParentTransform {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    world_x: f32,
    world_y: f32,
}

impl Skeleton {
    /// Recomputes the bone's world transform from its local pose.
    pub fn update_bone_world_transform(&mut self, bone_index: usize) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let (x, y, rotation, scale_x, scale_y, shear_x, shear_y) = (
            bone.x,
            bone.y,
            bone.rotation,
            bone.scale_x,
            bone.scale_y,
            bone.shear_x,
            bone.shear_y,
        );
        self.update_bone_world_transform_with(
            bone_index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
        );
    }

    /// Computes the bone's world transform from the given local pose and its parent's world
    /// transform, honoring the bone's transform mode. The given pose becomes the applied pose.
    #[allow(clippy::too_many_arguments)]
    pub fn update_bone_world_transform_with(
        &mut self,
        bone_index: usize,
        x: f32,
        y: f32,
        rotation: f32,
        scale_x: f32,
        scale_y: f32,
        shear_x: f32,
        shear_y: f32,
    ) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let parent = bone.parent.and_then(|p| self.bones.get(p)).map(|p| ParentTransform {
            a: p.a,
            b: p.b,
            c: p.c,
            d: p.d,
            world_x: p.world_x,
            world_y: p.world_y,
        });
        let (sx, sy, skeleton_x, skeleton_y) = (self.scale_x, self.scale_y, self.x, self.y);

        let bone = &mut self.bones[bone_index];
        bone.ax = x;
        bone.ay = y;
        bone.arotation = rotation;
        bone.ascale_x = scale_x;
        bone.ascale_y = scale_y;
        bone.ashear_x = shear_x;
        bone.ashear_y = shear_y;

        match parent {
            None => update_world_transform_root(bone, skeleton_x, skeleton_y, sx, sy),
            Some(parent) => update_world_transform_child(bone, sx, sy, &parent),
        }
    }

    /// Recovers the applied pose from the current world transform. Needed after anything writes
    /// `a, b, c, d, world_x, world_y` directly. Ambiguous matrices (e.g. scale -1,-1 versus a
    /// 180 degree rotation) resolve consistently but may differ from the original local values.
    pub fn update_applied_transform(&mut self, bone_index: usize) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        let (a, b, c, d, wx, wy) = (bone.a, bone.b, bone.c, bone.d, bone.world_x, bone.world_y);
        let mode = bone.transform_mode;
        let rotation = bone.rotation;
        let parent = bone.parent.and_then(|p| self.bones.get(p)).map(|p| ParentTransform {
            a: p.a,
            b: p.b,
            c: p.c,
            d: p.d,
            world_x: p.world_x,
            world_y: p.world_y,
        });
        let (skeleton_sx, skeleton_sy) = (self.scale_x, self.scale_y);

        let Some(parent) = parent else {
            let (ax, ay) = (wx - self.x, wy - self.y);
            let bone = &mut self.bones[bone_index];
            bone.ax = ax;
            bone.ay = ay;
            bone.arotation = math::atan2_deg(c, a);
            bone.ascale_x = (a * a + c * c).sqrt();
            bone.ascale_y = (b * b + d * d).sqrt();
            bone.ashear_x = 0.0;
            bone.ashear_y = math::atan2_deg(a * b + c * d, a * d - b * c);
            return;
        };

        let (pa, mut pb, pc, mut pd) = (parent.a, parent.b, parent.c, parent.d);
        let det = pa * pd - pb * pc;
        let mut pid = 1.0 / det;
        let mut ia = pd * pid;
        let mut ib = pb * pid;
        let mut ic = pc * pid;
        let mut id = pa * pid;
        let dx = wx - parent.world_x;
        let dy = wy - parent.world_y;
        let ax = dx * ia - dy * ib;
        let ay = dy * id - dx * ic;

        let (ra, rb, rc, rd) = if mode == TransformMode::OnlyTranslation {
            (a, b, c, d)
        } else {
            match mode {
                TransformMode::NoRotationOrReflection => {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc);
                    pb = -pc * skeleton_sx * s / skeleton_sy;
                    pd = pa * skeleton_sy * s / skeleton_sx;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                }
                TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
                    let cos = math::cos_deg(rotation);
                    let sin = math::sin_deg(rotation);
                    let mut za = (pa * cos + pb * sin) / skeleton_sx;
                    let mut zc = (pc * cos + pd * sin) / skeleton_sy;
                    let mut s = (za * za + zc * zc).sqrt();
                    if s > 1.0e-5 {
                        s = 1.0 / s;
                    }
                    za *= s;
                    zc *= s;
                    s = (za * za + zc * zc).sqrt();
                    if mode == TransformMode::NoScale
                        && (det < 0.0) != ((skeleton_sx < 0.0) != (skeleton_sy < 0.0))
                    {
                        s = -s;
                    }
                    let r = math::PI / 2.0 + zc.atan2(za);
                    pb = r.cos() * s;
                    pd = r.sin() * s;
                    pid = 1.0 / (za * pd - pb * zc);
                    ia = pd * pid;
                    ib = pb * pid;
                    ic = zc * pid;
                    id = za * pid;
                }
                _ => {}
            }
            (
                ia * a - ib * c,
                ia * b - ib * d,
                id * c - ic * a,
                id * d - ic * b,
            )
        };

        let mut ascale_x = (ra * ra + rc * rc).sqrt();
        let (arotation, ascale_y, ashear_y) = if ascale_x > 1.0e-4 {
            let det = ra * rd - rb * rc;
            (
                math::atan2_deg(rc, ra),
                det / ascale_x,
                -math::atan2_deg(ra * rb + rc * rd, det),
            )
        } else {
            ascale_x = 0.0;
            (
                90.0 - math::atan2_deg(rd, rb),
                (rb * rb + rd * rd).sqrt(),
                0.0,
            )
        };

        let bone = &mut self.bones[bone_index];
        bone.ax = ax;
        bone.ay = ay;
        bone.arotation = arotation;
        bone.ascale_x = ascale_x;
        bone.ascale_y = ascale_y;
        bone.ashear_x = 0.0;
        bone.ashear_y = ashear_y;
    }
}

fn update_world_transform_root(bone: &mut Bone, x: f32, y: f32, scale_x: f32, scale_y: f32) {
    let rotation_y = bone.arotation + 90.0 + bone.ashear_y;
    let rotation_x = bone.arotation + bone.ashear_x;
    bone.a = math::cos_deg(rotation_x) * bone.ascale_x * scale_x;
    bone.b = math::cos_deg(rotation_y) * bone.ascale_y * scale_x;
    bone.c = math::sin_deg(rotation_x) * bone.ascale_x * scale_y;
    bone.d = math::sin_deg(rotation_y) * bone.ascale_y * scale_y;
    bone.world_x = bone.ax * scale_x + x;
    bone.world_y = bone.ay * scale_y + y;
}

fn update_world_transform_child(
    bone: &mut Bone,
    skeleton_scale_x: f32,
    skeleton_scale_y: f32,
    parent: &ParentTransform,
) {
    let (mut pa, mut pb, mut pc, mut pd) = (parent.a, parent.b, parent.c, parent.d);
    bone.world_x = pa * bone.ax + pb * bone.ay + parent.world_x;
    bone.world_y = pc * bone.ax + pd * bone.ay + parent.world_y;

    match bone.transform_mode {
        TransformMode::Normal => {
            let rotation_y = bone.arotation + 90.0 + bone.ashear_y;
            let la = math::cos_deg(bone.arotation + bone.ashear_x) * bone.ascale_x;
            let lb = math::cos_deg(rotation_y) * bone.ascale_y;
            let lc = math::sin_deg(bone.arotation + bone.ashear_x) * bone.ascale_x;
            let ld = math::sin_deg(rotation_y) * bone.ascale_y;
            bone.a = pa * la + pb * lc;
            bone.b = pa * lb + pb * ld;
            bone.c = pc * la + pd * lc;
            bone.d = pc * lb + pd * ld;
            return;
        }
        TransformMode::OnlyTranslation => {
            let rotation_y = bone.arotation + 90.0 + bone.ashear_y;
            bone.a = math::cos_deg(bone.arotation + bone.ashear_x) * bone.ascale_x;
            bone.b = math::cos_deg(rotation_y) * bone.ascale_y;
            bone.c = math::sin_deg(bone.arotation + bone.ashear_x) * bone.ascale_x;
            bone.d = math::sin_deg(rotation_y) * bone.ascale_y;
        }
        TransformMode::NoRotationOrReflection => {
            let sx = 1.0 / skeleton_scale_x;
            let sy = 1.0 / skeleton_scale_y;
            pa *= sx;
            pc *= sy;
            let mut s = pa * pa + pc * pc;
            let prx;
            if s > 1.0e-4 {
                s = (pa * pd * sy - pb * sx * pc).abs() / s;
                pb = pc * s;
                pd = pa * s;
                prx = math::atan2_deg(pc, pa);
            } else {
                pa = 0.0;
                pc = 0.0;
                prx = 90.0 - math::atan2_deg(pd, pb);
            }
            let rx = bone.arotation + bone.ashear_x - prx;
            let ry = bone.arotation + bone.ashear_y - prx + 90.0;
            let la = math::cos_deg(rx) * bone.ascale_x;
            let lb = math::cos_deg(ry) * bone.ascale_y;
            let lc = math::sin_deg(rx) * bone.ascale_x;
            let ld = math::sin_deg(ry) * bone.ascale_y;
            bone.a = pa * la - pb * lc;
            bone.b = pa * lb - pb * ld;
            bone.c = pc * la + pd * lc;
            bone.d = pc * lb + pd * ld;
        }
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
            let cos = math::cos_deg(bone.arotation);
            let sin = math::sin_deg(bone.arotation);
            let mut za = (pa * cos + pb * sin) / skeleton_scale_x;
            let mut zc = (pc * cos + pd * sin) / skeleton_scale_y;
            let mut s = (za * za + zc * zc).sqrt();
            if s > 1.0e-5 {
                s = 1.0 / s;
            }
            za *= s;
            zc *= s;
            s = (za * za + zc * zc).sqrt();
            if bone.transform_mode == TransformMode::NoScale
                && (pa * pd - pb * pc < 0.0)
                    != ((skeleton_scale_x < 0.0) != (skeleton_scale_y < 0.0))
            {
                s = -s;
            }
            let r = math::PI / 2.0 + zc.atan2(za);
            let zb = r.cos() * s;
            let zd = r.sin() * s;
            let la = math::cos_deg(bone.ashear_x) * bone.ascale_x;
            let lb = math::cos_deg(90.0 + bone.ashear_y) * bone.ascale_y;
            let lc = math::sin_deg(bone.ashear_x) * bone.ascale_x;
            let ld = math::sin_deg(90.0 + bone.ashear_y) * bone.ascale_y;
            bone.a = za * la + zb * lc;
            bone.b = za * lb + zb * ld;
            bone.c = zc * la + zd * lc;
            bone.d = zc * lb + zd * ld;
        }
    }

    bone.a *= skeleton_scale_x;
    bone.b *= skeleton_scale_x;
    bone.c *= skeleton_scale_y;
    bone.d *= skeleton_scale_y;
}
