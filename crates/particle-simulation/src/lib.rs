//! # Particle Simulation Engine
//!
//! Double-buffered simulation state for a fixed N×N grid of particle slots,
//! advanced one step per frame by a data-parallel kernel on the GPU (or on the
//! CPU thread pool when no adapter is available).

pub mod context;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod injection;
pub mod params;
mod readback;
pub mod substrate;

pub use context::*;
pub use controller::*;
pub use cpu::*;
pub use error::*;
pub use gpu::*;
pub use injection::*;
pub use params::*;
pub use substrate::*;
