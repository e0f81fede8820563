use std::sync::Arc;

use crate::{Animation, Color, Skin};

/// How a bone inherits its parent's world transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
pub struct BoneData {
    pub index: usize,
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
    pub skin_required: bool,
    /// Editor color, not used at runtime.
    pub color: Color,
}

impl BoneData {
    pub fn new(index: usize, name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            index,
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
            skin_required: false,
            color: Color::new(0.61, 0.61, 0.61, 1.0),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub index: usize,
    pub name: String,
    pub bone: usize,
    pub color: Color,
    pub dark_color: Option<Color>,
    pub attachment_name: Option<String>,
    pub blend_mode: BlendMode,
}

impl SlotData {
    pub fn new(index: usize, name: impl Into<String>, bone: usize) -> Self {
        Self {
            index,
            name: name.into(),
            bone,
            color: Color::WHITE,
            dark_color: None,
            attachment_name: None,
            blend_mode: BlendMode::Normal,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    /// One or two bones; the second must be a direct child of the first.
    pub bones: Vec<usize>,
    pub target: usize,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub mix: f32,
    pub softness: f32,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            bend_direction: 1,
            compress: false,
            stretch: false,
            uniform: false,
            mix: 1.0,
            softness: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub rotate_mix: f32,
    pub translate_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,
    pub relative: bool,
    pub local: bool,
}

impl TransformConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            rotate_mix: 1.0,
            translate_mix: 1.0,
            scale_mix: 1.0,
            shear_mix: 1.0,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            relative: false,
            local: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum PositionMode {
    Fixed,
    #[default]
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum SpacingMode {
    #[default]
    Length,
    Fixed,
    Percent,
    Proportional,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
pub struct PathConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    /// Slot whose current attachment must be a path attachment.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub rotate_mix: f32,
    pub translate_mix: f32,
}

impl PathConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            rotate_mix: 1.0,
            translate_mix: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

impl EventData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume: 1.0,
            ..Self::default()
        }
    }
}

/// A fired event: the keyed values copied out of the timeline at fire time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Event {
    pub data: Arc<EventData>,
    pub time: f32,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
    pub volume: f32,
    pub balance: f32,
}

impl Event {
    pub fn new(time: f32, data: Arc<EventData>) -> Self {
        Self {
            time,
            int_value: data.int_value,
            float_value: data.float_value,
            string_value: data.string_value.clone(),
            volume: data.volume,
            balance: data.balance,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }
}

/// The setup pose and every shared asset needed to build [`crate::Skeleton`] instances.
///
/// Bones are stored parent-first with the root at index 0. Lookups by name scan linearly, so
/// callers that look names up per frame should cache the returned indices.
#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<Arc<Skin>>,
    pub default_skin: Option<Arc<Skin>>,
    pub events: Vec<Arc<EventData>>,
    pub animations: Vec<Arc<Animation>>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub version: Option<String>,
    pub hash: Option<String>,
    pub fps: f32,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<&Arc<Skin>> {
        self.skins.iter().find(|s| s.name() == name)
    }

    pub fn find_event(&self, name: &str) -> Option<&Arc<EventData>> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<&Arc<Animation>> {
        self.animations.iter().find(|a| a.name() == name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.ik_constraints.iter().position(|c| c.name == name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.transform_constraints
            .iter()
            .position(|c| c.name == name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.path_constraints.iter().position(|c| c.name == name)
    }

    /// Checks the structural rules the runtime relies on: a single root first, parents before
    /// children, and in-range references from slots and constraints.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let invalid = |message: String| Err(crate::Error::InvalidValue { message });
        for (i, bone) in self.bones.iter().enumerate() {
            match bone.parent {
                None if i != 0 => {
                    return invalid(format!("bone '{}' has no parent but is not first", bone.name));
                }
                Some(parent) if parent >= i => {
                    return invalid(format!("bone '{}' is listed before its parent", bone.name));
                }
                _ => {}
            }
        }
        let bone_count = self.bones.len();
        for slot in &self.slots {
            if slot.bone >= bone_count {
                return invalid(format!("slot '{}' references a missing bone", slot.name));
            }
        }
        for c in &self.ik_constraints {
            if c.target >= bone_count
                || c.bones.is_empty()
                || c.bones.len() > 2
                || c.bones.iter().any(|&b| b >= bone_count)
            {
                return invalid(format!("ik constraint '{}' has invalid bones", c.name));
            }
            if c.bones.len() == 2 && self.bones[c.bones[1]].parent != Some(c.bones[0]) {
                return invalid(format!(
                    "ik constraint '{}' child bone is not a direct child of its parent bone",
                    c.name
                ));
            }
            if self.bones[c.bones[0]].parent.is_none() {
                return invalid(format!("ik constraint '{}' constrains the root bone", c.name));
            }
        }
        for c in &self.transform_constraints {
            if c.target >= bone_count || c.bones.iter().any(|&b| b >= bone_count) {
                return invalid(format!("transform constraint '{}' has invalid bones", c.name));
            }
        }
        for c in &self.path_constraints {
            if c.target >= self.slots.len() || c.bones.iter().any(|&b| b >= bone_count) {
                return invalid(format!("path constraint '{}' has invalid references", c.name));
            }
        }
        Ok(())
    }
}
