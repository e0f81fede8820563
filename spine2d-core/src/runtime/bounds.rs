use std::sync::Arc;

use crate::{Attachment, Bone, Skeleton};

/// World-space polygons of the visible bounding box attachments, for hit detection.
#[derive(Clone, Debug)]
pub struct SkeletonBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
    bounding_boxes: Vec<BoundingBoxHit>,
    polygons: Vec<Vec<f32>>,
}

/// A bounding box attachment found by [`SkeletonBounds::update`].
#[derive(Clone, Debug)]
pub struct BoundingBoxHit {
    pub slot_index: usize,
    pub attachment: Arc<Attachment>,
}

impl Default for SkeletonBounds {
    fn default() -> Self {
        Self {
            min_x: f32::NEG_INFINITY,
            min_y: f32::NEG_INFINITY,
            max_x: f32::INFINITY,
            max_y: f32::INFINITY,
            bounding_boxes: Vec::new(),
            polygons: Vec::new(),
        }
    }
}

impl SkeletonBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the bounding box attachment of every slot whose bone is active and computes its
    /// world polygon. Without `update_aabb` the box is left unbounded, so the `aabb_*` checks
    /// always pass.
    pub fn update(&mut self, skeleton: &Skeleton, update_aabb: bool) {
        self.bounding_boxes.clear();
        self.polygons.clear();

        for (slot_index, slot) in skeleton.slots.iter().enumerate() {
            if !skeleton.bones.get(slot.bone()).is_some_and(Bone::is_active) {
                continue;
            }
            let Some(attachment) = slot.attachment() else {
                continue;
            };
            let Attachment::BoundingBox(bounding_box) = attachment.as_ref() else {
                continue;
            };
            let count = bounding_box.vertex.world_vertices_length;
            let mut polygon = vec![0.0; count];
            bounding_box
                .vertex
                .compute_world_vertices(&skeleton.bones, slot, 0, count, &mut polygon, 0, 2);
            self.bounding_boxes.push(BoundingBoxHit {
                slot_index,
                attachment: attachment.clone(),
            });
            self.polygons.push(polygon);
        }

        if update_aabb {
            self.compute_aabb();
        } else {
            self.min_x = f32::NEG_INFINITY;
            self.min_y = f32::NEG_INFINITY;
            self.max_x = f32::INFINITY;
            self.max_y = f32::INFINITY;
        }
    }

    fn compute_aabb(&mut self) {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for point in self.polygons.iter().flat_map(|p| p.chunks_exact(2)) {
            min_x = min_x.min(point[0]);
            min_y = min_y.min(point[1]);
            max_x = max_x.max(point[0]);
            max_y = max_y.max(point[1]);
        }
        self.min_x = min_x;
        self.min_y = min_y;
        self.max_x = max_x;
        self.max_y = max_y;
    }

    pub fn bounding_boxes(&self) -> &[BoundingBoxHit] {
        &self.bounding_boxes
    }

    pub fn polygons(&self) -> &[Vec<f32>] {
        &self.polygons
    }

    /// The polygon computed for the bounding box attached to `slot_index`.
    pub fn polygon(&self, slot_index: usize) -> Option<&[f32]> {
        let i = self
            .bounding_boxes
            .iter()
            .position(|b| b.slot_index == slot_index)?;
        Some(&self.polygons[i])
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn aabb_contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn aabb_intersects_segment(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        let (min_x, min_y, max_x, max_y) = (self.min_x, self.min_y, self.max_x, self.max_y);
        if (x1 <= min_x && x2 <= min_x)
            || (y1 <= min_y && y2 <= min_y)
            || (x1 >= max_x && x2 >= max_x)
            || (y1 >= max_y && y2 >= max_y)
        {
            return false;
        }
        // Either end inside the box also covers vertical and horizontal segments.
        if self.aabb_contains_point(x1, y1) || self.aabb_contains_point(x2, y2) {
            return true;
        }
        let m = (y2 - y1) / (x2 - x1);
        let y = m * (min_x - x1) + y1;
        if y > min_y && y < max_y {
            return true;
        }
        let y = m * (max_x - x1) + y1;
        if y > min_y && y < max_y {
            return true;
        }
        let x = (min_y - y1) / m + x1;
        if x > min_x && x < max_x {
            return true;
        }
        let x = (max_y - y1) / m + x1;
        x > min_x && x < max_x
    }

    pub fn aabb_intersects_skeleton(&self, other: &SkeletonBounds) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// The first bounding box whose polygon contains the point. Check
    /// [`SkeletonBounds::aabb_contains_point`] first when testing many points.
    pub fn contains_point(&self, x: f32, y: f32) -> Option<&BoundingBoxHit> {
        self.polygons
            .iter()
            .position(|p| polygon_contains_point(p, x, y))
            .map(|i| &self.bounding_boxes[i])
    }

    /// The first bounding box whose polygon touches the segment.
    pub fn intersects_segment(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Option<&BoundingBoxHit> {
        self.polygons
            .iter()
            .position(|p| polygon_intersects_segment(p, x1, y1, x2, y2))
            .map(|i| &self.bounding_boxes[i])
    }
}

/// Even-odd point in polygon test over flat `x, y` pairs.
pub fn polygon_contains_point(polygon: &[f32], x: f32, y: f32) -> bool {
    let n = polygon.len() & !1;
    if n < 6 {
        return false;
    }
    let mut prev = n - 2;
    let mut inside = false;
    for i in (0..n).step_by(2) {
        let vertex_y = polygon[i + 1];
        let prev_y = polygon[prev + 1];
        if (vertex_y < y && prev_y >= y) || (prev_y < y && vertex_y >= y) {
            let vertex_x = polygon[i];
            if vertex_x + (y - vertex_y) / (prev_y - vertex_y) * (polygon[prev] - vertex_x) < x {
                inside = !inside;
            }
        }
        prev = i;
    }
    inside
}

/// True if any polygon edge crosses the segment.
pub fn polygon_intersects_segment(polygon: &[f32], x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
    let n = polygon.len() & !1;
    if n < 4 {
        return false;
    }
    let width12 = x1 - x2;
    let height12 = y1 - y2;
    let det1 = x1 * y2 - y1 * x2;
    let mut x3 = polygon[n - 2];
    let mut y3 = polygon[n - 1];
    for point in polygon[..n].chunks_exact(2) {
        let (x4, y4) = (point[0], point[1]);
        let det2 = x3 * y4 - y3 * x4;
        let width34 = x3 - x4;
        let height34 = y3 - y4;
        let det3 = width12 * height34 - height12 * width34;
        if det3 != 0.0 {
            let x = (det1 * width34 - width12 * det2) / det3;
            if within(x, x3, x4) && within(x, x1, x2) {
                let y = (det1 * height34 - height12 * det2) / det3;
                if within(y, y3, y4) && within(y, y1, y2) {
                    return true;
                }
            }
        }
        x3 = x4;
        y3 = y4;
    }
    false
}

fn within(value: f32, a: f32, b: f32) -> bool {
    (value >= a && value <= b) || (value >= b && value <= a)
}
