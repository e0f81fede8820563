use std::sync::Arc;

use crate::{Bone, Color, Slot, math};

/// A packed texture region as produced by an atlas loader.
///
/// `degrees` is the rotation the packer applied (0, 90, 180 or 270). `page_size` is the texture
/// page size in pixels when the region comes from an atlas page; mesh UVs then account for
/// whitespace stripping and rotation instead of spanning `u..u2`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRegion {
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub degrees: i32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
    pub original_width: f32,
    pub original_height: f32,
    pub page_size: Option<(f32, f32)>,
}

impl Default for TextureRegion {
    fn default() -> Self {
        Self {
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
            degrees: 0,
            offset_x: 0.0,
            offset_y: 0.0,
            width: 1.0,
            height: 1.0,
            original_width: 1.0,
            original_height: 1.0,
            page_size: None,
        }
    }
}

/// Shared state of every attachment whose geometry is transformed by bones.
///
/// `bones` is `None` for unweighted vertices (`x, y` pairs relative to the slot's bone). When
/// present it is laid out as `[count, bone..., count, bone..., ...]` per vertex and `vertices`
/// holds `x, y, weight` triples, one per bone influence.
#[derive(Clone, Debug)]
pub struct VertexAttachment {
    id: u32,
    pub name: String,
    pub bones: Option<Vec<usize>>,
    pub vertices: Vec<f32>,
    pub world_vertices_length: usize,
    /// Deform timelines keyed for the attachment with this id also apply to this attachment.
    pub deform_attachment_id: u32,
}

impl VertexAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        let id = crate::ids::next_vertex_attachment_id();
        Self {
            id,
            name: name.into(),
            bones: None,
            vertices: Vec::new(),
            world_vertices_length: 0,
            deform_attachment_id: id,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sets unweighted `x, y` vertices.
    pub fn set_vertices(&mut self, vertices: Vec<f32>) {
        self.bones = None;
        self.world_vertices_length = vertices.len();
        self.vertices = vertices;
    }

    /// Sets weighted vertices; see the type docs for the layout.
    pub fn set_weighted_vertices(&mut self, bones: Vec<usize>, vertices: Vec<f32>) {
        let mut vertex_count = 0usize;
        let mut i = 0usize;
        while i < bones.len() {
            i += bones[i] + 1;
            vertex_count += 1;
        }
        self.world_vertices_length = vertex_count * 2;
        self.bones = Some(bones);
        self.vertices = vertices;
    }

    /// Transforms `count` world floats starting at local float `start` and writes `x, y` pairs to
    /// `world_vertices` at `offset`, advancing by `stride` per vertex. The slot's deform, when
    /// present, replaces unweighted positions or offsets weighted ones.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_world_vertices(
        &self,
        bones: &[Bone],
        slot: &Slot,
        start: usize,
        count: usize,
        world_vertices: &mut [f32],
        offset: usize,
        stride: usize,
    ) {
        let end = offset + (count >> 1) * stride;
        let deform = slot.deform.as_slice();

        let Some(weights) = &self.bones else {
            let Some(bone) = bones.get(slot.bone()) else {
                return;
            };
            let vertices = if deform.is_empty() {
                self.vertices.as_slice()
            } else {
                deform
            };
            let (x, y) = (bone.world_x, bone.world_y);
            let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
            let mut v = start;
            let mut w = offset;
            while w < end && v + 1 < vertices.len() && w + 1 < world_vertices.len() {
                let vx = vertices[v];
                let vy = vertices[v + 1];
                world_vertices[w] = vx * a + vy * b + x;
                world_vertices[w + 1] = vx * c + vy * d + y;
                v += 2;
                w += stride;
            }
            return;
        };

        let mut v = 0usize;
        let mut skip = 0usize;
        let mut i = 0usize;
        while i < start && v < weights.len() {
            let n = weights[v];
            v += n + 1;
            skip += n;
            i += 2;
        }

        let mut b = skip * 3;
        let mut f = skip << 1;
        let mut w = offset;
        while w < end && v < weights.len() && w + 1 < world_vertices.len() {
            let mut wx = 0.0f32;
            let mut wy = 0.0f32;
            let n = weights[v] + v + 1;
            v += 1;
            while v < n {
                let (Some(bone), Some(&vx), Some(&vy), Some(&weight)) = (
                    weights.get(v).and_then(|&i| bones.get(i)),
                    self.vertices.get(b),
                    self.vertices.get(b + 1),
                    self.vertices.get(b + 2),
                ) else {
                    v += 1;
                    b += 3;
                    f += 2;
                    continue;
                };
                let (vx, vy) = if deform.is_empty() {
                    (vx, vy)
                } else {
                    (
                        vx + deform.get(f).copied().unwrap_or(0.0),
                        vy + deform.get(f + 1).copied().unwrap_or(0.0),
                    )
                };
                wx += (vx * bone.a + vy * bone.b + bone.world_x) * weight;
                wy += (vx * bone.c + vy * bone.d + bone.world_y) * weight;
                v += 1;
                b += 3;
                f += 2;
            }
            world_vertices[w] = wx;
            world_vertices[w + 1] = wy;
            w += stride;
        }
    }

    /// Copies geometry into `other`, keeping this attachment's deform link.
    fn copy_to(&self, other: &mut VertexAttachment) {
        other.bones = self.bones.clone();
        other.vertices = self.vertices.clone();
        other.world_vertices_length = self.world_vertices_length;
        other.deform_attachment_id = self.deform_attachment_id;
    }

    fn copy(&self) -> Self {
        let mut copy = Self::new(self.name.clone());
        self.copy_to(&mut copy);
        copy
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Color,
    pub region: Option<TextureRegion>,
    /// Corner offsets in bone space: bottom-right, bottom-left, upper-left, upper-right.
    pub offset: [f32; 8],
    pub uvs: [f32; 8],
}

impl RegionAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: 0.0,
            height: 0.0,
            color: Color::WHITE,
            region: None,
            offset: [0.0; 8],
            uvs: [0.0; 8],
        }
    }

    /// Recomputes the corner offsets and UVs from the placement fields and the region.
    pub fn update_region(&mut self) {
        let region = self.region.clone().unwrap_or_else(|| TextureRegion {
            width: self.width,
            height: self.height,
            original_width: self.width,
            original_height: self.height,
            ..TextureRegion::default()
        });

        let region_scale_x = if region.original_width != 0.0 {
            self.width / region.original_width * self.scale_x
        } else {
            0.0
        };
        let region_scale_y = if region.original_height != 0.0 {
            self.height / region.original_height * self.scale_y
        } else {
            0.0
        };
        let local_x = -self.width / 2.0 * self.scale_x + region.offset_x * region_scale_x;
        let local_y = -self.height / 2.0 * self.scale_y + region.offset_y * region_scale_y;
        let local_x2 = local_x + region.width * region_scale_x;
        let local_y2 = local_y + region.height * region_scale_y;
        let cos = math::cos_deg(self.rotation);
        let sin = math::sin_deg(self.rotation);
        let local_x_cos = local_x * cos + self.x;
        let local_x_sin = local_x * sin;
        let local_y_cos = local_y * cos + self.y;
        let local_y_sin = local_y * sin;
        let local_x2_cos = local_x2 * cos + self.x;
        let local_x2_sin = local_x2 * sin;
        let local_y2_cos = local_y2 * cos + self.y;
        let local_y2_sin = local_y2 * sin;

        self.offset = [
            local_x_cos - local_y_sin,
            local_y_cos + local_x_sin,
            local_x_cos - local_y2_sin,
            local_y2_cos + local_x_sin,
            local_x2_cos - local_y2_sin,
            local_y2_cos + local_x2_sin,
            local_x2_cos - local_y_sin,
            local_y_cos + local_x2_sin,
        ];

        self.uvs = if region.degrees == 90 {
            [
                region.u2, region.v2, region.u, region.v2, region.u, region.v, region.u2, region.v,
            ]
        } else {
            [
                region.u, region.v2, region.u, region.v, region.u2, region.v, region.u2, region.v2,
            ]
        };
    }

    /// Writes the four corners in the same order as [`RegionAttachment::offset`].
    pub fn compute_world_vertices(
        &self,
        bone: &Bone,
        world_vertices: &mut [f32],
        mut offset: usize,
        stride: usize,
    ) {
        for corner in self.offset.chunks_exact(2) {
            if offset + 1 >= world_vertices.len() {
                return;
            }
            let (ox, oy) = (corner[0], corner[1]);
            world_vertices[offset] = ox * bone.a + oy * bone.b + bone.world_x;
            world_vertices[offset + 1] = ox * bone.c + oy * bone.d + bone.world_y;
            offset += stride;
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshAttachment {
    pub vertex: VertexAttachment,
    pub path: String,
    pub color: Color,
    pub region: Option<TextureRegion>,
    pub region_uvs: Vec<f32>,
    pub uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub edges: Vec<u16>,
    pub width: f32,
    pub height: f32,
    parent_mesh: Option<Arc<Attachment>>,
}

impl MeshAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            vertex: VertexAttachment::new(name),
            color: Color::WHITE,
            region: None,
            region_uvs: Vec::new(),
            uvs: Vec::new(),
            triangles: Vec::new(),
            hull_length: 0,
            edges: Vec::new(),
            width: 0.0,
            height: 0.0,
            parent_mesh: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.vertex.name
    }

    pub fn parent_mesh(&self) -> Option<&Arc<Attachment>> {
        self.parent_mesh.as_ref()
    }

    /// Links this mesh to `parent`, sharing its geometry. Non-mesh parents are ignored.
    pub fn set_parent_mesh(&mut self, parent: Arc<Attachment>) {
        let Attachment::Mesh(parent_mesh) = parent.as_ref() else {
            log::warn!(
                "ignoring non-mesh parent '{}' for linked mesh '{}'",
                parent.name(),
                self.name()
            );
            return;
        };
        self.vertex.bones = parent_mesh.vertex.bones.clone();
        self.vertex.vertices = parent_mesh.vertex.vertices.clone();
        self.vertex.world_vertices_length = parent_mesh.vertex.world_vertices_length;
        self.region_uvs = parent_mesh.region_uvs.clone();
        self.triangles = parent_mesh.triangles.clone();
        self.hull_length = parent_mesh.hull_length;
        self.edges = parent_mesh.edges.clone();
        self.width = parent_mesh.width;
        self.height = parent_mesh.height;
        self.parent_mesh = Some(parent);
    }

    /// Recomputes `uvs` from `region_uvs` and the region.
    pub fn update_uvs(&mut self) {
        let n = self.region_uvs.len();
        if self.uvs.len() != n {
            self.uvs = vec![0.0; n];
        }
        let region_uvs = &self.region_uvs;
        let uvs = &mut self.uvs;

        let Some(region) = &self.region else {
            uvs.copy_from_slice(region_uvs);
            return;
        };

        let mut u = region.u;
        let mut v = region.v;
        let (width, height);
        if let Some((texture_width, texture_height)) = region.page_size {
            match region.degrees {
                90 => {
                    u -= (region.original_height - region.offset_y - region.height) / texture_width;
                    v -= (region.original_width - region.offset_x - region.width) / texture_height;
                    let width = region.original_height / texture_width;
                    let height = region.original_width / texture_height;
                    for i in (0..n.saturating_sub(1)).step_by(2) {
                        uvs[i] = u + region_uvs[i + 1] * width;
                        uvs[i + 1] = v + (1.0 - region_uvs[i]) * height;
                    }
                    return;
                }
                180 => {
                    u -= (region.original_width - region.offset_x - region.width) / texture_width;
                    v -= region.offset_y / texture_height;
                    let width = region.original_width / texture_width;
                    let height = region.original_height / texture_height;
                    for i in (0..n.saturating_sub(1)).step_by(2) {
                        uvs[i] = u + (1.0 - region_uvs[i]) * width;
                        uvs[i + 1] = v + (1.0 - region_uvs[i + 1]) * height;
                    }
                    return;
                }
                270 => {
                    u -= region.offset_y / texture_width;
                    v -= region.offset_x / texture_height;
                    let width = region.original_height / texture_width;
                    let height = region.original_width / texture_height;
                    for i in (0..n.saturating_sub(1)).step_by(2) {
                        uvs[i] = u + (1.0 - region_uvs[i + 1]) * width;
                        uvs[i + 1] = v + region_uvs[i] * height;
                    }
                    return;
                }
                _ => {}
            }
            u -= region.offset_x / texture_width;
            v -= (region.original_height - region.offset_y - region.height) / texture_height;
            width = region.original_width / texture_width;
            height = region.original_height / texture_height;
        } else {
            width = region.u2 - u;
            height = region.v2 - v;
        }

        for i in (0..n.saturating_sub(1)).step_by(2) {
            uvs[i] = u + region_uvs[i] * width;
            uvs[i + 1] = v + region_uvs[i + 1] * height;
        }
    }
}

#[derive(Clone, Debug)]
pub struct BoundingBoxAttachment {
    pub vertex: VertexAttachment,
    pub color: Color,
}

impl BoundingBoxAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            vertex: VertexAttachment::new(name),
            color: Color::WHITE,
        }
    }
}

/// A cubic Bezier spline. Vertices are stored as `in-handle, point, out-handle` triples.
#[derive(Clone, Debug)]
pub struct PathAttachment {
    pub vertex: VertexAttachment,
    /// Cumulative length at the end of each curve.
    pub lengths: Vec<f32>,
    pub closed: bool,
    /// Recompute curve lengths every sample so spacing stays even along the path.
    pub constant_speed: bool,
    pub color: Color,
}

impl PathAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            vertex: VertexAttachment::new(name),
            lengths: Vec::new(),
            closed: false,
            constant_speed: true,
            color: Color::new(1.0, 0.5, 0.0, 1.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PointAttachment {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub color: Color,
}

impl PointAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            color: Color::new(0.38, 0.94, 0.0, 1.0),
        }
    }

    pub fn compute_world_position(&self, bone: &Bone) -> (f32, f32) {
        (
            self.x * bone.a + self.y * bone.b + bone.world_x,
            self.x * bone.c + self.y * bone.d + bone.world_y,
        )
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        let cos = math::cos_deg(self.rotation);
        let sin = math::sin_deg(self.rotation);
        let x = cos * bone.a + sin * bone.b;
        let y = cos * bone.c + sin * bone.d;
        math::atan2_deg(y, x)
    }
}

#[derive(Clone, Debug)]
pub struct ClippingAttachment {
    pub vertex: VertexAttachment,
    /// Clipping stops after this slot in draw order; `None` clips to the end.
    pub end_slot: Option<usize>,
    pub color: Color,
}

impl ClippingAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            vertex: VertexAttachment::new(name),
            end_slot: None,
            color: Color::new(0.2275, 0.2275, 0.8078, 1.0),
        }
    }
}

/// Immutable geometry bound to slots through skins. Shared as `Arc<Attachment>`.
#[derive(Clone, Debug)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Path(PathAttachment),
    Point(PointAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Self::Region(a) => &a.name,
            Self::Mesh(a) => &a.vertex.name,
            Self::BoundingBox(a) => &a.vertex.name,
            Self::Path(a) => &a.vertex.name,
            Self::Point(a) => &a.name,
            Self::Clipping(a) => &a.vertex.name,
        }
    }

    pub fn as_vertex(&self) -> Option<&VertexAttachment> {
        match self {
            Self::Mesh(a) => Some(&a.vertex),
            Self::BoundingBox(a) => Some(&a.vertex),
            Self::Path(a) => Some(&a.vertex),
            Self::Clipping(a) => Some(&a.vertex),
            Self::Region(_) | Self::Point(_) => None,
        }
    }

    /// Returns an independent copy. Linked meshes stay linked to the same parent.
    pub fn copy(&self) -> Attachment {
        match self {
            Self::Region(a) => Self::Region(a.clone()),
            Self::Mesh(a) => {
                if let Some(parent) = a.parent_mesh.clone() {
                    return linked_mesh(a, parent);
                }
                let mut copy = a.clone();
                copy.vertex = a.vertex.copy();
                Self::Mesh(copy)
            }
            Self::BoundingBox(a) => Self::BoundingBox(BoundingBoxAttachment {
                vertex: a.vertex.copy(),
                color: a.color,
            }),
            Self::Path(a) => Self::Path(PathAttachment {
                vertex: a.vertex.copy(),
                lengths: a.lengths.clone(),
                closed: a.closed,
                constant_speed: a.constant_speed,
                color: a.color,
            }),
            Self::Point(a) => Self::Point(a.clone()),
            Self::Clipping(a) => Self::Clipping(ClippingAttachment {
                vertex: a.vertex.copy(),
                end_slot: a.end_slot,
                color: a.color,
            }),
        }
    }

    /// Creates a mesh sharing this mesh's geometry (or its parent's, for linked meshes) that
    /// deforms with the same deform timelines. Returns `None` for non-mesh attachments.
    pub fn new_linked_mesh(self: &Arc<Self>) -> Option<Attachment> {
        let Self::Mesh(mesh) = self.as_ref() else {
            return None;
        };
        let parent = mesh.parent_mesh.clone().unwrap_or_else(|| Arc::clone(self));
        Some(linked_mesh(mesh, parent))
    }
}

fn linked_mesh(source: &MeshAttachment, parent: Arc<Attachment>) -> Attachment {
    let mut copy = MeshAttachment::new(source.name());
    copy.path = source.path.clone();
    copy.region = source.region.clone();
    copy.color = source.color;
    copy.vertex.deform_attachment_id = source.vertex.deform_attachment_id;
    copy.set_parent_mesh(parent);
    copy.update_uvs();
    Attachment::Mesh(copy)
}
