//! Execution engines for the step kernels
//!
//! A substrate owns the double-buffered state and knows how to run one step
//! over every slot. The controller drives it and never touches buffers directly.

use crate::injection::InjectionOverlay;
use crate::{Result, StepParams};
use glam::UVec2;
use particle_physics::{Injection, SimulationGrid, SlotState};

/// The two most recent result buffers, in whatever form the substrate keeps them.
#[derive(Clone, Copy, Debug)]
pub struct SimulationOutputs<T> {
    pub position: T,
    pub velocity: T,
}

pub trait ComputeSubstrate {
    /// Borrowed handles to the current state. They go stale on the next step.
    type Outputs<'a>
    where
        Self: 'a;

    fn grid(&self) -> SimulationGrid;

    /// Copy the overlay planes (flags, position input, velocity input) to where
    /// the kernels read them.
    fn upload_overlay(&mut self, overlay: &InjectionOverlay);

    /// Run both kernels once over every slot and swap the state buffers.
    fn dispatch(&mut self, params: &StepParams);

    /// Overwrite one slot of the current state, bypassing the kernels.
    fn write_slot(&mut self, coord: UVec2, injection: &Injection);

    fn read_slot(&self, coord: UVec2) -> Result<SlotState>;

    /// Every slot in index order.
    fn read_state(&self) -> Result<Vec<SlotState>>;

    fn outputs(&self) -> Self::Outputs<'_>;
}
