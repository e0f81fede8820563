use std::sync::Arc;

use crate::test_fixtures::{assert_approx, bone};
use crate::{Skeleton, SkeletonData, TransformConstraintData};

/// A rotated, scaled `target` and a `follower`, both under the root.
fn rig(configure: impl FnOnce(&mut SkeletonData)) -> Skeleton {
    let mut target = bone(1, "target", Some(0));
    target.x = 30.0;
    target.y = 10.0;
    target.rotation = 45.0;
    target.scale_x = 2.0;
    target.scale_y = 2.0;
    let mut follower = bone(2, "follower", Some(0));
    follower.x = -5.0;
    let mut data = SkeletonData {
        bones: vec![bone(0, "root", None), target, follower],
        transform_constraints: vec![TransformConstraintData::new("follow", vec![2], 1)],
        ..SkeletonData::default()
    };
    configure(&mut data);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

fn only_rotate(mix: f32) -> impl FnOnce(&mut SkeletonData) {
    move |data| {
        let c = &mut data.transform_constraints[0];
        c.rotate_mix = mix;
        c.translate_mix = 0.0;
        c.scale_mix = 0.0;
        c.shear_mix = 0.0;
    }
}

#[test]
fn absolute_world_copies_the_target_and_refreshes_the_applied_pose() {
    let skeleton = rig(|_| {});
    let follower = &skeleton.bones[2];
    assert_approx(follower.world_x, 30.0);
    assert_approx(follower.world_y, 10.0);
    assert_approx(follower.world_rotation_x(), 45.0);
    assert_approx(follower.world_scale_x(), 2.0);
    assert_approx(follower.world_scale_y(), 2.0);

    assert_approx(follower.ax, 30.0);
    assert_approx(follower.ay, 10.0);
    assert_approx(follower.arotation, 45.0);
    assert_approx(follower.ascale_x, 2.0);
    // The local pose animations write is left alone.
    assert_approx(follower.x, -5.0);
    assert_approx(follower.rotation, 0.0);
}

#[test]
fn each_mix_is_applied_independently() {
    let skeleton = rig(only_rotate(0.5));
    let follower = &skeleton.bones[2];
    assert_approx(follower.world_rotation_x(), 22.5);
    assert_approx(follower.world_x, -5.0);
    assert_approx(follower.world_scale_x(), 1.0);

    let skeleton = rig(|data| {
        let c = &mut data.transform_constraints[0];
        c.rotate_mix = 0.0;
        c.translate_mix = 0.5;
        c.scale_mix = 0.0;
        c.shear_mix = 0.0;
    });
    let follower = &skeleton.bones[2];
    assert_approx(follower.world_x, 12.5);
    assert_approx(follower.world_y, 5.0);
    assert_approx(follower.world_rotation_x(), 0.0);
}

#[test]
fn absolute_world_offsets_are_in_target_space() {
    let skeleton = rig(|data| {
        let c = &mut data.transform_constraints[0];
        c.offset_x = 10.0;
        c.offset_rotation = 10.0;
        c.offset_scale_x = 0.5;
    });
    let follower = &skeleton.bones[2];
    let step = 20.0 * std::f32::consts::FRAC_1_SQRT_2;
    assert_approx(follower.world_x, 30.0 + step);
    assert_approx(follower.world_y, 10.0 + step);
    assert_approx(follower.world_rotation_x(), 55.0);
    assert_approx(follower.world_scale_x(), 2.5);
}

#[test]
fn relative_world_adds_the_target_transform() {
    let skeleton = rig(|data| {
        data.bones[2].rotation = 20.0;
        data.transform_constraints[0].relative = true;
    });
    let follower = &skeleton.bones[2];
    assert_approx(follower.world_rotation_x(), 65.0);
    assert_approx(follower.world_x, 25.0);
    assert_approx(follower.world_y, 10.0);
    assert_approx(follower.world_scale_x(), 2.0);
}

#[test]
fn absolute_local_copies_the_applied_pose() {
    let skeleton = rig(|data| data.transform_constraints[0].local = true);
    let follower = &skeleton.bones[2];
    assert_approx(follower.ax, 30.0);
    assert_approx(follower.ay, 10.0);
    assert_approx(follower.arotation, 45.0);
    assert_approx(follower.ascale_x, 2.0);
    assert_approx(follower.ascale_y, 2.0);
    assert_approx(follower.world_rotation_x(), 45.0);
}

#[test]
fn absolute_local_rotation_takes_the_short_way_round() {
    let skeleton = rig(|data| {
        data.bones[1].rotation = 170.0;
        data.bones[2].rotation = -170.0;
        data.transform_constraints[0].local = true;
        only_rotate(0.5)(data);
    });
    let follower = &skeleton.bones[2];
    assert_approx(follower.arotation, -180.0);

    let skeleton = rig(|data| {
        data.bones[1].rotation = 170.0;
        data.bones[2].rotation = -170.0;
        data.transform_constraints[0].local = true;
        only_rotate(1.0)(data);
    });
    assert_approx(skeleton.bones[2].arotation, -190.0);
    assert_approx(skeleton.bones[2].world_rotation_x(), 170.0);
}

#[test]
fn relative_local_offsets_the_follower_pose() {
    let skeleton = rig(|data| {
        data.bones[2].rotation = 20.0;
        data.transform_constraints[0].local = true;
        data.transform_constraints[0].relative = true;
    });
    let follower = &skeleton.bones[2];
    assert_approx(follower.arotation, 65.0);
    assert_approx(follower.ax, 25.0);
    assert_approx(follower.ay, 10.0);
    assert_approx(follower.ascale_x, 2.0);
}

#[test]
fn the_target_is_never_constrained_by_itself() {
    let skeleton = rig(|data| data.transform_constraints[0].bones = vec![1, 2]);
    let target = &skeleton.bones[1];
    assert_approx(target.world_x, 30.0);
    assert_approx(target.world_rotation_x(), 45.0);
    assert_approx(skeleton.bones[2].world_x, 30.0);
}
