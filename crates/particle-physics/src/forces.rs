//! Per-slot update rule
//!
//! NOTE: The GPU path runs the same rule in `shaders/step.wgsl`. Keep the two in sync.

use crate::slot::{Injection, SlotState};
use glam::Vec3;

/// Soft boundary pulling escaped particles back toward the origin.
///
/// Zero inside `radius`; outside it points at the origin with magnitude `dt / |p|`.
pub fn attractor_force(position: Vec3, dt: f32, radius: f32) -> Vec3 {
    let distance = position.length();
    if distance > radius {
        -position.normalize() * dt / distance
    } else {
        Vec3::ZERO
    }
}

/// Advance one slot by `dt`.
///
/// An injected position is integrated with the (possibly injected) velocity.
/// An injected velocity is taken as-is for the next state. Either way the
/// override lasts one step and the slot then evolves like any other.
pub fn advance_slot(
    previous: SlotState,
    injection: Option<&Injection>,
    dt: f32,
    velocity_scale: f32,
    radius: f32,
) -> SlotState {
    let position = injection
        .and_then(|i| i.position)
        .unwrap_or(previous.position);
    let velocity = injection
        .and_then(|i| i.velocity)
        .unwrap_or(previous.velocity);

    let velocity_next = match injection.and_then(|i| i.velocity) {
        Some(injected) => injected,
        None => velocity + attractor_force(position, dt, radius),
    };

    SlotState {
        position: position + velocity * dt * velocity_scale,
        velocity: velocity_next,
    }
}
