use std::sync::Arc;

use crate::{
    Attachment, Bone, Color, Error, IkConstraint, PathConstraint, SkeletonData, Skin, Slot,
    TransformConstraint,
};

/// A posable instance of [`SkeletonData`].
///
/// Bones, slots and constraints live in flat arrays and refer to each other by index. The shared
/// data, skins and attachments are never mutated through a skeleton.
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    /// Slot indices in the order they are drawn.
    pub draw_order: Vec<usize>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    skin: Option<Arc<Skin>>,
    pub color: Color,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    time: f32,
    update_cache: Vec<UpdateCacheItem>,
}

/// One entry of the cached evaluation order replayed by [`Skeleton::update_world_transform`].
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
    Path(usize),
}

/// Axis-aligned bounds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let mut bones = data.bones.iter().map(Bone::new).collect::<Vec<_>>();
        for i in 0..bones.len() {
            if let Some(parent) = bones[i].parent_index() {
                if parent < bones.len() {
                    bones[parent].children.push(i);
                }
            }
        }

        let slots = data.slots.iter().map(Slot::new).collect::<Vec<_>>();
        let draw_order = (0..slots.len()).collect();
        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(i, d)| IkConstraint::new(i, d))
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(i, d)| TransformConstraint::new(i, d))
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(i, d)| PathConstraint::new(i, d))
            .collect();

        let mut skeleton = Self {
            data,
            bones,
            slots,
            draw_order,
            ik_constraints,
            transform_constraints,
            path_constraints,
            skin: None,
            color: Color::WHITE,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            time: 0.0,
            update_cache: Vec::new(),
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_cache();
        skeleton
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        if time.is_finite() {
            self.time = time;
        }
    }

    /// Advances the time used for attachment timing.
    pub fn update(&mut self, delta: f32) {
        if delta.is_finite() {
            self.time += delta;
        }
    }

    pub fn skin(&self) -> Option<&Arc<Skin>> {
        self.skin.as_ref()
    }

    pub fn root_bone(&self) -> Option<&Bone> {
        self.bones.first()
    }

    pub fn update_cache_items(&self) -> &[UpdateCacheItem] {
        &self.update_cache
    }

    /// Recomputes bone and constraint activity for the current skin and rebuilds the evaluation
    /// order. Call after changing the skin or the constraint set.
    pub fn update_cache(&mut self) {
        for bone in &mut self.bones {
            bone.active = !self
                .data
                .bones
                .get(bone.data_index())
                .map(|d| d.skin_required)
                .unwrap_or(false);
        }
        if let Some(skin) = self.skin.clone() {
            for &bone_index in &skin.bones {
                let mut current = Some(bone_index);
                while let Some(i) = current {
                    let Some(bone) = self.bones.get_mut(i) else {
                        break;
                    };
                    bone.active = true;
                    current = bone.parent_index();
                }
            }
        }

        let skin = self.skin.clone();
        let skin = skin.as_deref();
        for c in &mut self.ik_constraints {
            let skin_required = self.data.ik_constraints[c.data_index()].skin_required;
            let in_skin = skin.is_some_and(|s| s.ik_constraints.contains(&c.data_index()));
            let target_active = self.bones.get(c.target).is_some_and(Bone::is_active);
            c.active = target_active && (!skin_required || in_skin);
        }
        for c in &mut self.transform_constraints {
            let skin_required = self.data.transform_constraints[c.data_index()].skin_required;
            let in_skin = skin.is_some_and(|s| s.transform_constraints.contains(&c.data_index()));
            let target_active = self.bones.get(c.target).is_some_and(Bone::is_active);
            c.active = target_active && (!skin_required || in_skin);
        }
        for c in &mut self.path_constraints {
            let skin_required = self.data.path_constraints[c.data_index()].skin_required;
            let in_skin = skin.is_some_and(|s| s.path_constraints.contains(&c.data_index()));
            let target_active = self
                .slots
                .get(c.target)
                .and_then(|s| self.bones.get(s.bone()))
                .is_some_and(Bone::is_active);
            c.active = target_active && (!skin_required || in_skin);
        }

        self.update_cache = build_update_cache(self);
        log::debug!(
            "rebuilt update cache: {} entries for {} bones",
            self.update_cache.len(),
            self.bones.len()
        );
    }

    /// Replays the cached evaluation order: bones compute their world transforms and constraints
    /// adjust them.
    pub fn update_world_transform(&mut self) {
        for i in 0..self.update_cache.len() {
            match self.update_cache[i] {
                UpdateCacheItem::Bone(bone) => self.update_bone_world_transform(bone),
                UpdateCacheItem::Ik(c) => self.update_ik_constraint(c),
                UpdateCacheItem::Transform(c) => self.update_transform_constraint(c),
                UpdateCacheItem::Path(c) => self.update_path_constraint(c),
            }
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Resets bone local poses and constraint mixes.
    pub fn set_bones_to_setup_pose(&mut self) {
        for bone in &mut self.bones {
            if let Some(data) = self.data.bones.get(bone.data_index()) {
                bone.set_to_setup_pose(data);
            }
        }
        for c in &mut self.ik_constraints {
            c.set_to_setup_pose(&self.data.ik_constraints[c.data_index()]);
        }
        for c in &mut self.transform_constraints {
            c.set_to_setup_pose(&self.data.transform_constraints[c.data_index()]);
        }
        for c in &mut self.path_constraints {
            c.set_to_setup_pose(&self.data.path_constraints[c.data_index()]);
        }
    }

    /// Resets draw order, slot colors and setup attachments.
    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order = (0..self.slots.len()).collect();
        for i in 0..self.slots.len() {
            self.set_slot_to_setup_pose(i);
        }
    }

    pub fn set_slot_to_setup_pose(&mut self, slot_index: usize) {
        let Some(data) = self.data.slots.get(slot_index) else {
            return;
        };
        let attachment = data
            .attachment_name
            .as_deref()
            .and_then(|name| self.attachment(slot_index, name))
            .cloned();
        let time = self.time;
        let slot = &mut self.slots[slot_index];
        slot.reset_colors(data);
        slot.set_attachment(None, time);
        slot.set_attachment(attachment, time);
    }

    /// Looks the attachment up in the current skin, then in the default skin.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Arc<Attachment>> {
        self.skin
            .as_deref()
            .and_then(|skin| skin.attachment(slot_index, name))
            .or_else(|| {
                self.data
                    .default_skin
                    .as_deref()
                    .and_then(|skin| skin.attachment(slot_index, name))
            })
    }

    pub fn attachment_by_name(&self, slot_name: &str, name: &str) -> Option<&Arc<Attachment>> {
        self.attachment(self.data.find_slot(slot_name)?, name)
    }

    /// Sets a slot's attachment, stamping the skeleton's current time.
    pub fn set_slot_attachment(&mut self, slot_index: usize, attachment: Option<Arc<Attachment>>) {
        let time = self.time;
        if let Some(slot) = self.slots.get_mut(slot_index) {
            slot.set_attachment(attachment, time);
        }
    }

    /// Sets the named slot's attachment from the skins; `None` clears it.
    pub fn set_attachment(&mut self, slot_name: &str, attachment_name: Option<&str>) -> Result<(), Error> {
        let slot_index = self.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
        })?;
        let attachment = match attachment_name {
            None => None,
            Some(name) => Some(
                self.attachment(slot_index, name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownAttachment {
                        slot: slot_name.to_string(),
                        name: name.to_string(),
                    })?,
            ),
        };
        self.set_slot_attachment(slot_index, attachment);
        Ok(())
    }

    /// Seconds since the slot's current attachment was set.
    pub fn slot_attachment_time(&self, slot_index: usize) -> f32 {
        self.slots
            .get(slot_index)
            .map(|s| s.attachment_time(self.time))
            .unwrap_or(0.0)
    }

    /// Switches skins. From no skin, slots get their setup attachments from the new skin; from
    /// another skin, attachments shown from the old skin are swapped for the new skin's
    /// attachments with the same name. Constraint and bone activity is recomputed.
    pub fn set_skin(&mut self, skin: Option<Arc<Skin>>) {
        let unchanged = match (&self.skin, &skin) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        if let Some(new_skin) = &skin {
            match self.skin.clone() {
                Some(old_skin) => new_skin.attach_all(self, &old_skin),
                None => {
                    for i in 0..self.slots.len() {
                        let Some(name) = self
                            .data
                            .slots
                            .get(i)
                            .and_then(|d| d.attachment_name.as_deref())
                        else {
                            continue;
                        };
                        if let Some(attachment) = new_skin.attachment(i, name).cloned() {
                            self.set_slot_attachment(i, Some(attachment));
                        }
                    }
                }
            }
        }
        log::debug!(
            "skin changed to {:?}",
            skin.as_deref().map(Skin::name)
        );
        self.skin = skin;
        self.update_cache();
    }

    pub fn set_skin_by_name(&mut self, name: &str) -> Result<(), Error> {
        let skin = self
            .data
            .find_skin(name)
            .cloned()
            .ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?;
        self.set_skin(Some(skin));
        Ok(())
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_ik_constraint(name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_transform_constraint(name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_path_constraint(name)
    }

    /// World-space bounds of region and mesh attachments, or `None` when nothing is visible.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        let mut vertices = Vec::<f32>::new();

        for &slot_index in &self.draw_order {
            let Some(slot) = self.slots.get(slot_index) else {
                continue;
            };
            if !self.bones.get(slot.bone()).map(Bone::is_active).unwrap_or(false) {
                continue;
            }
            let Some(attachment) = slot.attachment() else {
                continue;
            };
            match attachment.as_ref() {
                Attachment::Region(region) => {
                    vertices.clear();
                    vertices.resize(8, 0.0);
                    region.compute_world_vertices(&self.bones[slot.bone()], &mut vertices, 0, 2);
                }
                Attachment::Mesh(mesh) => {
                    let count = mesh.vertex.world_vertices_length;
                    vertices.clear();
                    vertices.resize(count, 0.0);
                    mesh.vertex.compute_world_vertices(
                        &self.bones,
                        slot,
                        0,
                        count,
                        &mut vertices,
                        0,
                        2,
                    );
                }
                _ => continue,
            }
            for point in vertices.chunks_exact(2) {
                min_x = min_x.min(point[0]);
                min_y = min_y.min(point[1]);
                max_x = max_x.max(point[0]);
                max_y = max_y.max(point[1]);
            }
        }

        if min_x > max_x {
            return None;
        }
        Some(Bounds {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }
}

fn build_update_cache(skeleton: &Skeleton) -> Vec<UpdateCacheItem> {
    fn sort_bone(
        bones: &[Bone],
        bone_index: usize,
        sorted: &mut [bool],
        out: &mut Vec<UpdateCacheItem>,
    ) {
        if sorted.get(bone_index).copied().unwrap_or(true) {
            return;
        }
        if let Some(parent) = bones[bone_index].parent_index() {
            sort_bone(bones, parent, sorted, out);
        }
        sorted[bone_index] = true;
        out.push(UpdateCacheItem::Bone(bone_index));
    }

    fn sort_reset(bones: &[Bone], children: &[usize], sorted: &mut [bool]) {
        for &child in children {
            let Some(bone) = bones.get(child) else {
                continue;
            };
            if !bone.is_active() {
                continue;
            }
            if sorted[child] {
                sort_reset(bones, &bone.children, sorted);
            }
            sorted[child] = false;
        }
    }

    fn sort_path_attachment(
        bones: &[Bone],
        attachment: &Attachment,
        slot_bone: usize,
        sorted: &mut [bool],
        out: &mut Vec<UpdateCacheItem>,
    ) {
        let Attachment::Path(path) = attachment else {
            return;
        };
        let Some(path_bones) = &path.vertex.bones else {
            sort_bone(bones, slot_bone, sorted, out);
            return;
        };
        let mut i = 0usize;
        while i < path_bones.len() {
            let n = path_bones[i] + i + 1;
            i += 1;
            while i < n && i < path_bones.len() {
                sort_bone(bones, path_bones[i], sorted, out);
                i += 1;
            }
        }
    }

    let bones = skeleton.bones.as_slice();
    let mut sorted = bones.iter().map(|b| !b.is_active()).collect::<Vec<_>>();
    let mut out = Vec::with_capacity(
        bones.len()
            + skeleton.ik_constraints.len()
            + skeleton.transform_constraints.len()
            + skeleton.path_constraints.len(),
    );

    // IK first, shallowest constrained bone first. The sort is stable.
    let mut iks = (0..skeleton.ik_constraints.len())
        .filter(|&i| skeleton.ik_constraints[i].active)
        .map(|i| {
            let mut level = 0usize;
            let first = skeleton.ik_constraints[i].bones.first().copied();
            let mut current = first.and_then(|b| bones.get(b)).and_then(Bone::parent_index);
            while let Some(b) = current {
                level += 1;
                current = bones.get(b).and_then(Bone::parent_index);
            }
            (level, i)
        })
        .collect::<Vec<_>>();
    iks.sort_by_key(|&(level, _)| level);

    for (_, index) in iks {
        let constraint = &skeleton.ik_constraints[index];
        sort_bone(bones, constraint.target, &mut sorted, &mut out);
        let Some(&parent) = constraint.bones.first() else {
            continue;
        };
        sort_bone(bones, parent, &mut sorted, &mut out);
        let children = bones.get(parent).map(|b| b.children.as_slice()).unwrap_or(&[]);
        match constraint.bones.last() {
            Some(&child) if child != parent => {
                sort_bone(bones, child, &mut sorted, &mut out);
                out.push(UpdateCacheItem::Ik(index));
                sort_reset(bones, children, &mut sorted);
                if let Some(s) = sorted.get_mut(child) {
                    *s = true;
                }
            }
            _ => {
                out.push(UpdateCacheItem::Ik(index));
                sort_reset(bones, children, &mut sorted);
            }
        }
    }

    for (index, constraint) in skeleton.path_constraints.iter().enumerate() {
        if !constraint.active {
            continue;
        }
        let Some(slot) = skeleton.slots.get(constraint.target) else {
            continue;
        };
        let slot_bone = slot.bone();
        let data = skeleton.data.as_ref();
        let skins = skeleton
            .skin
            .iter()
            .chain(data.default_skin.iter())
            .chain(data.skins.iter());
        for skin in skins {
            for attachment in skin.slot_attachments(constraint.target) {
                sort_path_attachment(bones, attachment, slot_bone, &mut sorted, &mut out);
            }
        }
        if let Some(attachment) = slot.attachment() {
            sort_path_attachment(bones, attachment, slot_bone, &mut sorted, &mut out);
        }

        for &bone in &constraint.bones {
            sort_bone(bones, bone, &mut sorted, &mut out);
        }
        out.push(UpdateCacheItem::Path(index));
        for &bone in &constraint.bones {
            if let Some(b) = bones.get(bone) {
                sort_reset(bones, &b.children, &mut sorted);
            }
        }
        for &bone in &constraint.bones {
            if let Some(s) = sorted.get_mut(bone) {
                *s = true;
            }
        }
    }

    for (index, constraint) in skeleton.transform_constraints.iter().enumerate() {
        if !constraint.active {
            continue;
        }
        sort_bone(bones, constraint.target, &mut sorted, &mut out);
        for &bone in &constraint.bones {
            sort_bone(bones, bone, &mut sorted, &mut out);
        }
        out.push(UpdateCacheItem::Transform(index));
        for &bone in &constraint.bones {
            if let Some(b) = bones.get(bone) {
                sort_reset(bones, &b.children, &mut sorted);
            }
        }
        for &bone in &constraint.bones {
            if let Some(s) = sorted.get_mut(bone) {
                *s = true;
            }
        }
    }

    for bone in 0..bones.len() {
        sort_bone(bones, bone, &mut sorted, &mut out);
    }
    out
}
