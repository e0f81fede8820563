use std::collections::HashMap;
use std::sync::Arc;

use crate::{Attachment, Skeleton};

/// One `(slot, name) -> attachment` mapping of a [`Skin`].
#[derive(Clone, Debug)]
pub struct SkinEntry {
    pub slot_index: usize,
    pub name: String,
    pub attachment: Arc<Attachment>,
}

/// Maps `(slot index, attachment name)` to attachments, plus the bones and constraints that are
/// only active while this skin is.
#[derive(Clone, Debug, Default)]
pub struct Skin {
    name: String,
    attachments: Vec<HashMap<String, Arc<Attachment>>>,
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
    pub path_constraints: Vec<usize>,
}

impl Skin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_attachment(
        &mut self,
        slot_index: usize,
        name: impl Into<String>,
        attachment: Arc<Attachment>,
    ) {
        if slot_index >= self.attachments.len() {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(name.into(), attachment);
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Arc<Attachment>> {
        self.attachments.get(slot_index)?.get(name)
    }

    pub fn remove_attachment(&mut self, slot_index: usize, name: &str) -> Option<Arc<Attachment>> {
        self.attachments.get_mut(slot_index)?.remove(name)
    }

    /// Every entry, ordered by slot then name so iteration is deterministic.
    pub fn attachments(&self) -> Vec<SkinEntry> {
        (0..self.attachments.len())
            .flat_map(|slot_index| self.attachments_for_slot(slot_index))
            .collect()
    }

    pub fn attachments_for_slot(&self, slot_index: usize) -> Vec<SkinEntry> {
        let Some(map) = self.attachments.get(slot_index) else {
            return Vec::new();
        };
        let mut entries = map
            .iter()
            .map(|(name, attachment)| SkinEntry {
                slot_index,
                name: name.clone(),
                attachment: Arc::clone(attachment),
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub(crate) fn slot_attachments(
        &self,
        slot_index: usize,
    ) -> impl Iterator<Item = &Arc<Attachment>> {
        self.attachments
            .get(slot_index)
            .into_iter()
            .flat_map(|map| map.values())
    }

    pub fn clear(&mut self) {
        self.attachments.clear();
    }

    /// Adds the other skin's bones, constraints and attachments. Attachments are shared, not
    /// copied.
    pub fn add_skin(&mut self, other: &Skin) {
        self.merge_requirements(other);
        for entry in other.attachments() {
            self.set_attachment(entry.slot_index, entry.name, entry.attachment);
        }
    }

    /// Like [`Skin::add_skin`] but attachments are copied; meshes become linked meshes so they
    /// keep sharing geometry and deform timelines with the originals.
    pub fn copy_skin(&mut self, other: &Skin) {
        self.merge_requirements(other);
        for entry in other.attachments() {
            let copy = match entry.attachment.new_linked_mesh() {
                Some(linked) => linked,
                None => entry.attachment.copy(),
            };
            self.set_attachment(entry.slot_index, entry.name, Arc::new(copy));
        }
    }

    fn merge_requirements(&mut self, other: &Skin) {
        fn union(into: &mut Vec<usize>, from: &[usize]) {
            for &i in from {
                if !into.contains(&i) {
                    into.push(i);
                }
            }
        }
        union(&mut self.bones, &other.bones);
        union(&mut self.ik_constraints, &other.ik_constraints);
        union(&mut self.transform_constraints, &other.transform_constraints);
        union(&mut self.path_constraints, &other.path_constraints);
    }

    /// Attaches this skin's attachments in place of those from `old_skin` currently shown, keyed by
    /// the name they had in `old_skin`.
    pub fn attach_all(&self, skeleton: &mut Skeleton, old_skin: &Skin) {
        for slot_index in 0..skeleton.slots.len() {
            let Some(current) = skeleton.slots[slot_index].attachment().cloned() else {
                continue;
            };
            let Some(map) = old_skin.attachments.get(slot_index) else {
                continue;
            };
            let key = map
                .iter()
                .find(|(_, attachment)| Arc::ptr_eq(attachment, &current))
                .map(|(key, _)| key.as_str());
            if let Some(attachment) = key.and_then(|key| self.attachment(slot_index, key)) {
                skeleton.set_slot_attachment(slot_index, Some(Arc::clone(attachment)));
            }
        }
    }
}
