//! Per-slot state and the injection tag state machine

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One RGBA32F texel as stored in the state and injection textures.
///
/// Live state texels carry `(xyz, 1)`; freshly allocated textures are all zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Texel {
    pub xyz: [f32; 3],
    pub w: f32,
}

impl Texel {
    pub const ZERO: Self = Self {
        xyz: [0.0; 3],
        w: 0.0,
    };

    /// Texel for a live vector (w = 1).
    pub fn from_vec3(v: Vec3) -> Self {
        Self {
            xyz: v.to_array(),
            w: 1.0,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::from_array(self.xyz)
    }
}

/// Position and velocity of a single slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlotState {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl SlotState {
    pub const ZERO: Self = Self {
        position: Vec3::ZERO,
        velocity: Vec3::ZERO,
    };

    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }

    pub fn from_texels(position: Texel, velocity: Texel) -> Self {
        Self {
            position: position.to_vec3(),
            velocity: velocity.to_vec3(),
        }
    }
}

/// Externally supplied values that replace a slot's state for one step.
///
/// Either half may be absent, in which case that half keeps evolving.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Injection {
    pub position: Option<Vec3>,
    pub velocity: Option<Vec3>,
}

impl Injection {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position: Some(position),
            velocity: Some(velocity),
        }
    }

    pub fn position_only(position: Vec3) -> Self {
        Self {
            position: Some(position),
            velocity: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.velocity.is_none()
    }

    /// Flag texel as read by the kernels: x = position flag, y = velocity flag.
    pub fn flag_texel(&self) -> Texel {
        let flag = |set: bool| if set { 1.0 } else { 0.0 };
        Texel {
            xyz: [flag(self.position.is_some()), flag(self.velocity.is_some()), 0.0],
            w: flag(!self.is_empty()),
        }
    }
}

/// Lifecycle of a slot with respect to injection.
///
/// `Empty` slots were never handed out. A `Pending` injection is consumed by
/// exactly one step, after which the slot is `Settled` for good.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SlotTag {
    #[default]
    Empty,
    Pending(Injection),
    Settled,
}

impl SlotTag {
    pub fn pending(&self) -> Option<&Injection> {
        match self {
            SlotTag::Pending(injection) => Some(injection),
            _ => None,
        }
    }
}
