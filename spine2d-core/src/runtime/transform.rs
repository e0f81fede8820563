use crate::{Skeleton, TransformConstraintData, math};

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub rotate_mix: f32,
    pub translate_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub(crate) fn new(data_index: usize, data: &TransformConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            rotate_mix: data.rotate_mix,
            translate_mix: data.translate_mix,
            scale_mix: data.scale_mix,
            shear_mix: data.shear_mix,
            active: true,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &TransformConstraintData) {
        self.rotate_mix = data.rotate_mix;
        self.translate_mix = data.translate_mix;
        self.scale_mix = data.scale_mix;
        self.shear_mix = data.shear_mix;
    }
}

#[derive(Copy, Clone, Debug)]
struct Mixes {
    rotate: f32,
    translate: f32,
    scale: f32,
    shear: f32,
}

impl Skeleton {
    pub(crate) fn update_transform_constraint(&mut self, index: usize) {
        let Some(constraint) = self.transform_constraints.get(index) else {
            return;
        };
        let data = &self.data.transform_constraints[constraint.data_index];
        let (local, relative) = (data.local, data.relative);
        let target = constraint.target;
        let bones = constraint.bones.clone();
        let mixes = Mixes {
            rotate: constraint.rotate_mix,
            translate: constraint.translate_mix,
            scale: constraint.scale_mix,
            shear: constraint.shear_mix,
        };
        let data_index = constraint.data_index;
        if target >= self.bones.len() {
            return;
        }
        match (local, relative) {
            (false, false) => self.transform_absolute_world(data_index, target, &bones, mixes),
            (false, true) => self.transform_relative_world(data_index, target, &bones, mixes),
            (true, false) => self.transform_absolute_local(data_index, target, &bones, mixes),
            (true, true) => self.transform_relative_local(data_index, target, &bones, mixes),
        }
    }

    fn transform_absolute_world(
        &mut self,
        data_index: usize,
        target: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        let skeleton_data = self.data.clone();
        let data = &skeleton_data.transform_constraints[data_index];
        let t = &self.bones[target];
        let (ta, tb, tc, td) = (t.a, t.b, t.c, t.d);
        let (tx, ty) = t.local_to_world(data.offset_x, data.offset_y);
        let deg_rad_reflect = if ta * td - tb * tc > 0.0 {
            math::DEG_RAD
        } else {
            -math::DEG_RAD
        };
        let offset_rotation = data.offset_rotation * deg_rad_reflect;
        let offset_shear_y = data.offset_shear_y * deg_rad_reflect;

        for &bone_index in bones {
            if bone_index == target {
                continue;
            }
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            let mut modified = false;

            if mix.rotate != 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let r = math::wrap_pi(tc.atan2(ta) - c.atan2(a) + offset_rotation) * mix.rotate;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
                modified = true;
            }

            if mix.translate != 0.0 {
                bone.world_x += (tx - bone.world_x) * mix.translate;
                bone.world_y += (ty - bone.world_y) * mix.translate;
                modified = true;
            }

            if mix.scale > 0.0 {
                let mut s = (bone.a * bone.a + bone.c * bone.c).sqrt();
                if s != 0.0 {
                    s = (s + ((ta * ta + tc * tc).sqrt() - s + data.offset_scale_x) * mix.scale) / s;
                }
                bone.a *= s;
                bone.c *= s;
                let mut s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                if s != 0.0 {
                    s = (s + ((tb * tb + td * td).sqrt() - s + data.offset_scale_y) * mix.scale) / s;
                }
                bone.b *= s;
                bone.d *= s;
                modified = true;
            }

            if mix.shear > 0.0 {
                let (b, d) = (bone.b, bone.d);
                let by = d.atan2(b);
                let r = math::wrap_pi(td.atan2(tb) - tc.atan2(ta) - (by - bone.c.atan2(bone.a)));
                let r = by + (r + offset_shear_y) * mix.shear;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
                modified = true;
            }

            if modified {
                self.update_applied_transform(bone_index);
            }
        }
    }

    fn transform_relative_world(
        &mut self,
        data_index: usize,
        target: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        let skeleton_data = self.data.clone();
        let data = &skeleton_data.transform_constraints[data_index];
        let t = &self.bones[target];
        let (ta, tb, tc, td) = (t.a, t.b, t.c, t.d);
        let (tx, ty) = t.local_to_world(data.offset_x, data.offset_y);
        let deg_rad_reflect = if ta * td - tb * tc > 0.0 {
            math::DEG_RAD
        } else {
            -math::DEG_RAD
        };
        let offset_rotation = data.offset_rotation * deg_rad_reflect;
        let offset_shear_y = data.offset_shear_y * deg_rad_reflect;

        for &bone_index in bones {
            if bone_index == target {
                continue;
            }
            let Some(bone) = self.bones.get_mut(bone_index) else {
                continue;
            };
            let mut modified = false;

            if mix.rotate != 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let r = math::wrap_pi(tc.atan2(ta) + offset_rotation) * mix.rotate;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
                modified = true;
            }

            if mix.translate != 0.0 {
                bone.world_x += tx * mix.translate;
                bone.world_y += ty * mix.translate;
                modified = true;
            }

            if mix.scale > 0.0 {
                let s = ((ta * ta + tc * tc).sqrt() - 1.0 + data.offset_scale_x) * mix.scale + 1.0;
                bone.a *= s;
                bone.c *= s;
                let s = ((tb * tb + td * td).sqrt() - 1.0 + data.offset_scale_y) * mix.scale + 1.0;
                bone.b *= s;
                bone.d *= s;
                modified = true;
            }

            if mix.shear > 0.0 {
                let r = math::wrap_pi(td.atan2(tb) - tc.atan2(ta));
                let (b, d) = (bone.b, bone.d);
                let r = d.atan2(b) + (r - math::PI / 2.0 + offset_shear_y) * mix.shear;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
                modified = true;
            }

            if modified {
                self.update_applied_transform(bone_index);
            }
        }
    }

    fn transform_absolute_local(
        &mut self,
        data_index: usize,
        target: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        let skeleton_data = self.data.clone();
        let data = &skeleton_data.transform_constraints[data_index];
        let t = &self.bones[target];
        let (t_rotation, t_x, t_y, t_scale_x, t_scale_y, t_shear_y) =
            (t.arotation, t.ax, t.ay, t.ascale_x, t.ascale_y, t.ashear_y);

        for &bone_index in bones {
            if bone_index == target {
                continue;
            }
            let Some(bone) = self.bones.get(bone_index) else {
                continue;
            };

            let mut rotation = bone.arotation;
            if mix.rotate != 0.0 {
                let r = math::shortest_rotation_delta(t_rotation - rotation + data.offset_rotation);
                rotation += r * mix.rotate;
            }

            let (mut x, mut y) = (bone.ax, bone.ay);
            if mix.translate != 0.0 {
                x += (t_x - x + data.offset_x) * mix.translate;
                y += (t_y - y + data.offset_y) * mix.translate;
            }

            let (mut scale_x, mut scale_y) = (bone.ascale_x, bone.ascale_y);
            if mix.scale != 0.0 {
                if scale_x != 0.0 {
                    scale_x += (t_scale_x - scale_x + data.offset_scale_x) * mix.scale;
                }
                if scale_y != 0.0 {
                    scale_y += (t_scale_y - scale_y + data.offset_scale_y) * mix.scale;
                }
            }

            let mut shear_y = bone.ashear_y;
            if mix.shear != 0.0 {
                let r = math::shortest_rotation_delta(t_shear_y - shear_y + data.offset_shear_y);
                shear_y += r * mix.shear;
            }

            let shear_x = bone.ashear_x;
            self.update_bone_world_transform_with(
                bone_index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
            );
        }
    }

    fn transform_relative_local(
        &mut self,
        data_index: usize,
        target: usize,
        bones: &[usize],
        mix: Mixes,
    ) {
        let skeleton_data = self.data.clone();
        let data = &skeleton_data.transform_constraints[data_index];
        let t = &self.bones[target];
        let (t_rotation, t_x, t_y, t_scale_x, t_scale_y, t_shear_y) =
            (t.arotation, t.ax, t.ay, t.ascale_x, t.ascale_y, t.ashear_y);

        for &bone_index in bones {
            if bone_index == target {
                continue;
            }
            let Some(bone) = self.bones.get(bone_index) else {
                continue;
            };

            let mut rotation = bone.arotation;
            if mix.rotate != 0.0 {
                rotation += (t_rotation + data.offset_rotation) * mix.rotate;
            }

            let (mut x, mut y) = (bone.ax, bone.ay);
            if mix.translate != 0.0 {
                x += (t_x + data.offset_x) * mix.translate;
                y += (t_y + data.offset_y) * mix.translate;
            }

            let (mut scale_x, mut scale_y) = (bone.ascale_x, bone.ascale_y);
            if mix.scale != 0.0 {
                scale_x *= (t_scale_x - 1.0 + data.offset_scale_x) * mix.scale + 1.0;
                scale_y *= (t_scale_y - 1.0 + data.offset_scale_y) * mix.scale + 1.0;
            }

            let mut shear_y = bone.ashear_y;
            if mix.shear != 0.0 {
                shear_y += (t_shear_y + data.offset_shear_y) * mix.shear;
            }

            let shear_x = bone.ashear_x;
            self.update_bone_world_transform_with(
                bone_index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
            );
        }
    }
}
