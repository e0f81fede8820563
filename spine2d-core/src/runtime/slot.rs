use std::sync::Arc;

use crate::{Attachment, BlendMode, Color, SlotData};

/// Per-instance slot state. The attachment is shared with the skin it came from.
#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    bone: usize,
    pub color: Color,
    pub dark_color: Option<Color>,
    pub blend_mode: BlendMode,
    attachment: Option<Arc<Attachment>>,
    /// Skeleton time at which the attachment was set.
    attachment_time: f32,
    /// Per-vertex positions (unweighted) or offsets (weighted) for the current attachment.
    pub deform: Vec<f32>,
    pub(crate) attachment_state: u32,
}

impl Slot {
    pub(crate) fn new(data: &SlotData) -> Self {
        Self {
            data_index: data.index,
            bone: data.bone,
            color: data.color,
            dark_color: data.dark_color,
            blend_mode: data.blend_mode,
            attachment: None,
            attachment_time: 0.0,
            deform: Vec::new(),
            attachment_state: 0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn bone(&self) -> usize {
        self.bone
    }

    pub fn attachment(&self) -> Option<&Arc<Attachment>> {
        self.attachment.as_ref()
    }

    /// Sets the attachment, recording `skeleton_time` as the time it was attached.
    ///
    /// Setting the attachment already shown is a no-op. The deform is cleared unless both the old
    /// and new attachments are vertex attachments driven by the same deform timelines.
    pub fn set_attachment(&mut self, attachment: Option<Arc<Attachment>>, skeleton_time: f32) {
        let unchanged = match (&self.attachment, &attachment) {
            (Some(old), Some(new)) => Arc::ptr_eq(old, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        let old_deform = self
            .attachment
            .as_deref()
            .and_then(Attachment::as_vertex)
            .map(|v| v.deform_attachment_id);
        let new_deform = attachment
            .as_deref()
            .and_then(Attachment::as_vertex)
            .map(|v| v.deform_attachment_id);
        if old_deform.is_none() || old_deform != new_deform {
            self.deform.clear();
        }
        self.attachment = attachment;
        self.attachment_time = skeleton_time;
    }

    /// Seconds the current attachment has been shown, given the skeleton's current time.
    pub fn attachment_time(&self, skeleton_time: f32) -> f32 {
        skeleton_time - self.attachment_time
    }

    pub fn set_attachment_time(&mut self, time: f32, skeleton_time: f32) {
        self.attachment_time = skeleton_time - time;
    }

    /// Restores colors and blend mode; attachments are resolved by the skeleton.
    pub(crate) fn reset_colors(&mut self, data: &SlotData) {
        self.color = data.color;
        self.dark_color = data.dark_color;
        self.blend_mode = data.blend_mode;
    }
}
