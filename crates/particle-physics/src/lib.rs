//! # Particle Physics
//!
//! Slot addressing and the per-slot update rule for the orbiting point-mass
//! simulation. Nothing in here touches the GPU; the same math is expressed in
//! WGSL by `particle-simulation`.

pub mod constants;
pub mod forces;
pub mod grid;
pub mod slot;

pub use constants::*;
pub use forces::*;
pub use grid::*;
pub use slot::*;
