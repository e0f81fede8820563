use std::sync::atomic::{AtomicU32, Ordering};

// Process-global so deform timelines can match attachments shared between skeletons.
static NEXT_VERTEX_ATTACHMENT_ID: AtomicU32 = AtomicU32::new(0);

pub(crate) fn next_vertex_attachment_id() -> u32 {
    NEXT_VERTEX_ATTACHMENT_ID.fetch_add(1, Ordering::Relaxed)
}
