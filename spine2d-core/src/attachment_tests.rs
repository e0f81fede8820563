use std::sync::Arc;

use crate::test_fixtures::{assert_approx, two_bone_data};
use crate::{
    Attachment, MeshAttachment, PointAttachment, RegionAttachment, Skeleton, TextureRegion,
};

fn posed_skeleton() -> Skeleton {
    let mut data = two_bone_data();
    data.bones[1].x = 10.0;
    data.bones[1].rotation = 90.0;
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn region_corners_follow_bone_world_transform() {
    let skeleton = posed_skeleton();
    let mut region = RegionAttachment::new("square");
    region.width = 20.0;
    region.height = 10.0;
    region.update_region();

    assert_eq!(region.offset, [-10.0, -5.0, -10.0, 5.0, 10.0, 5.0, 10.0, -5.0]);

    let mut world = [0.0; 8];
    region.compute_world_vertices(&skeleton.bones[1], &mut world, 0, 2);

    // Bone rotated 90 degrees at (10, 0): local (x, y) maps to (10 - y, x).
    let expected = [15.0, -10.0, 5.0, -10.0, 5.0, 10.0, 15.0, 10.0];
    for (actual, expected) in world.iter().copied().zip(expected) {
        assert_approx(actual, expected);
    }
}

#[test]
fn region_uvs_swap_for_rotated_regions() {
    let mut region = RegionAttachment::new("r");
    region.width = 4.0;
    region.height = 4.0;
    region.region = Some(TextureRegion {
        u: 0.0,
        v: 0.0,
        u2: 0.5,
        v2: 0.25,
        degrees: 90,
        width: 4.0,
        height: 4.0,
        original_width: 4.0,
        original_height: 4.0,
        ..TextureRegion::default()
    });
    region.update_region();
    assert_eq!(region.uvs, [0.5, 0.25, 0.0, 0.25, 0.0, 0.0, 0.5, 0.0]);
}

#[test]
fn weighted_mesh_blends_bone_positions() {
    let skeleton = posed_skeleton();
    let mut mesh = MeshAttachment::new("mesh");
    // One vertex: half on the root at (0, 0), half on the child at local (0, 0).
    mesh.vertex
        .set_weighted_vertices(vec![2, 0, 1], vec![0.0, 0.0, 0.5, 0.0, 0.0, 0.5]);
    assert_eq!(mesh.vertex.world_vertices_length, 2);

    let mut world = [0.0; 2];
    mesh.vertex
        .compute_world_vertices(&skeleton.bones, &skeleton.slots[0], 0, 2, &mut world, 0, 2);
    assert_approx(world[0], 5.0);
    assert_approx(world[1], 0.0);
}

#[test]
fn unweighted_vertices_use_deform_when_present() {
    let mut skeleton = posed_skeleton();
    let mut mesh = MeshAttachment::new("mesh");
    mesh.vertex.set_vertices(vec![1.0, 0.0]);
    skeleton.slots[0].deform = vec![2.0, 0.0];

    let mut world = [0.0; 2];
    mesh.vertex
        .compute_world_vertices(&skeleton.bones, &skeleton.slots[0], 0, 2, &mut world, 0, 2);
    assert_approx(world[0], 10.0);
    assert_approx(world[1], 2.0);
}

#[test]
fn linked_mesh_shares_geometry_and_deform_id() {
    let mut parent = MeshAttachment::new("parent");
    parent.vertex.set_vertices(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    parent.triangles = vec![0, 1, 2];
    parent.region_uvs = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    let parent_id = parent.vertex.id();
    let parent = Arc::new(Attachment::Mesh(parent));

    let Some(Attachment::Mesh(linked)) = parent.new_linked_mesh() else {
        panic!("mesh attachments link");
    };
    assert_eq!(linked.vertex.deform_attachment_id, parent_id);
    assert_ne!(linked.vertex.id(), parent_id);
    assert_eq!(linked.triangles, vec![0, 1, 2]);
    assert!(linked.parent_mesh().is_some_and(|p| Arc::ptr_eq(p, &parent)));
    assert_eq!(linked.uvs, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);

    let region = Arc::new(Attachment::Region(RegionAttachment::new("r")));
    assert!(region.new_linked_mesh().is_none());
}

#[test]
fn copy_of_plain_mesh_gets_fresh_id_but_keeps_deform_link() {
    let mut mesh = MeshAttachment::new("mesh");
    mesh.vertex.set_vertices(vec![0.0, 0.0]);
    let id = mesh.vertex.id();
    let Attachment::Mesh(copy) = Attachment::Mesh(mesh).copy() else {
        panic!("copy keeps the kind");
    };
    assert_ne!(copy.vertex.id(), id);
    assert_eq!(copy.vertex.deform_attachment_id, id);
    assert_eq!(copy.vertex.vertices, vec![0.0, 0.0]);
}

#[test]
fn mesh_uvs_map_into_region_bounds() {
    let mut mesh = MeshAttachment::new("mesh");
    mesh.region_uvs = vec![0.0, 0.0, 1.0, 1.0];
    mesh.region = Some(TextureRegion {
        u: 0.25,
        v: 0.5,
        u2: 0.75,
        v2: 1.0,
        ..TextureRegion::default()
    });
    mesh.update_uvs();
    assert_eq!(mesh.uvs, vec![0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn point_attachment_reports_world_position_and_rotation() {
    let skeleton = posed_skeleton();
    let mut point = PointAttachment::new("muzzle");
    point.x = 5.0;
    point.rotation = 10.0;
    let (x, y) = point.compute_world_position(&skeleton.bones[1]);
    assert_approx(x, 10.0);
    assert_approx(y, 5.0);
    assert_approx(point.compute_world_rotation(&skeleton.bones[1]), 100.0);
}
