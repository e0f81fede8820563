mod animation;
mod animation_state;
mod bone;
mod bounds;
pub(crate) mod curve;
mod ik;
mod path;
mod skeleton;
mod slot;
pub(crate) mod timeline;
mod transform;

pub use animation::*;
pub use animation_state::*;
pub use bone::*;
pub use bounds::*;
pub use curve::{BEZIER_SIZE, Curve, CurveFrames};
pub use ik::*;
pub use path::*;
pub use skeleton::*;
pub use slot::*;
pub use timeline::{
    AttachmentTimeline, BoneTimeline, ConstraintTimeline, DeformTimeline, DrawOrderTimeline,
    EventTimeline, MixBlend, MixDirection, PropertyId, SlotTimeline, Timeline,
};
pub use transform::*;




#[cfg(test)]
mod transform_constraint_tests;


#[cfg(test)]
mod timeline_tests;

#[cfg(test)]
mod animation_tests;

#[cfg(test)]
mod animation_state_tests;

#[cfg(test)]
mod animation_state_mixing_semantics_tests;
