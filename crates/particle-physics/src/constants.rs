//! Simulation constants
//!
//! Values are tuned for a visual demo, not for physical accuracy.

/// Edge length of the simulation grid (N). Capacity is N².
pub const GRID_WIDTH: u32 = 250;

/// Scale applied to velocity when integrating position (K in `p + v·dt·K`).
pub const VELOCITY_SCALE: f32 = 15.0;

/// Particles farther than this from the origin are pulled back.
pub const ATTRACTOR_RADIUS: f32 = 1.0;

/// Workgroup edge for the 2D compute kernels (8x8 invocations).
pub const WORKGROUP_SIZE: u32 = 8;
