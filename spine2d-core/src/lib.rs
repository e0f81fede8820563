//! Pose evaluation and animation mixing core for Spine-style 2D skeletons (unofficial).
//!
//! The crate owns no I/O: skeleton data and animations are built by a loader (or by hand) and
//! handed in as [`SkeletonData`]. Per frame, advance an [`AnimationState`], apply it to a
//! [`Skeleton`], then call [`Skeleton::update_world_transform`] and read bone world transforms,
//! slot attachments and deforms for rendering.

#![forbid(unsafe_code)]

mod attachment;
mod error;
mod ids;
pub mod math;
mod model;
mod runtime;
mod skin;

#[cfg(feature = "json")]
pub mod debug;

pub use attachment::*;
pub use error::*;
pub use math::Color;
pub use model::*;
pub use runtime::*;
pub use skin::*;

#[cfg(test)]
mod test_fixtures;


#[cfg(test)]
mod attachment_tests;
