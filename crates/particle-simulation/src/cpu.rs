//! CPU substrate
//!
//! Runs the step kernel as a rayon parallel map over A/B texel buffers laid out
//! exactly like the GPU textures. Slots never read each other, so the map has
//! no ordering constraints.

use crate::injection::InjectionOverlay;
use crate::substrate::{ComputeSubstrate, SimulationOutputs};
use crate::{Result, SimulationError, StepParams};
use glam::UVec2;
use particle_physics::{advance_slot, Injection, SimulationGrid, SlotState, Texel};
use rayon::prelude::*;

/// Host copy of the uploaded injection planes.
struct OverlayPlanes {
    flags: Vec<Texel>,
    position_input: Vec<Texel>,
    velocity_input: Vec<Texel>,
}

impl OverlayPlanes {
    /// Injection encoded for slot `offset`, if any flag is up.
    fn injection(&self, offset: usize) -> Option<Injection> {
        let flags = self.flags[offset].xyz;
        let injection = Injection {
            position: (flags[0] > 0.0).then(|| self.position_input[offset].to_vec3()),
            velocity: (flags[1] > 0.0).then(|| self.velocity_input[offset].to_vec3()),
        };
        (!injection.is_empty()).then_some(injection)
    }
}

pub struct CpuSubstrate {
    grid: SimulationGrid,
    positions: [Vec<Texel>; 2],
    velocities: [Vec<Texel>; 2],
    overlay: OverlayPlanes,
    current: usize, // index of the buffers holding the latest state
}

impl CpuSubstrate {
    pub fn new(grid: SimulationGrid) -> Self {
        let len = grid.capacity() as usize;
        let zeroed = || vec![Texel::ZERO; len];
        log::debug!("CPU substrate: {} slots", len);

        Self {
            grid,
            positions: [zeroed(), zeroed()],
            velocities: [zeroed(), zeroed()],
            overlay: OverlayPlanes {
                flags: zeroed(),
                position_input: zeroed(),
                velocity_input: zeroed(),
            },
            current: 0,
        }
    }
}

/// Split a ping-pong pair into (previous, next).
fn ping_pong(buffers: &mut [Vec<Texel>; 2], current: usize) -> (&[Texel], &mut [Texel]) {
    let [a, b] = buffers;
    if current == 0 {
        (a.as_slice(), b.as_mut_slice())
    } else {
        (b.as_slice(), a.as_mut_slice())
    }
}

impl ComputeSubstrate for CpuSubstrate {
    type Outputs<'a> = SimulationOutputs<&'a [Texel]>;

    fn grid(&self) -> SimulationGrid {
        self.grid
    }

    fn upload_overlay(&mut self, overlay: &InjectionOverlay) {
        self.overlay.flags.copy_from_slice(overlay.flags());
        self.overlay.position_input.copy_from_slice(overlay.position_input());
        self.overlay.velocity_input.copy_from_slice(overlay.velocity_input());
    }

    fn dispatch(&mut self, params: &StepParams) {
        let overlay = &self.overlay;
        let current = self.current;
        let (position_prev, position_next) = ping_pong(&mut self.positions, current);
        let (velocity_prev, velocity_next) = ping_pong(&mut self.velocities, current);

        position_next
            .par_iter_mut()
            .zip(velocity_next.par_iter_mut())
            .enumerate()
            .for_each(|(offset, (position, velocity))| {
                let previous =
                    SlotState::from_texels(position_prev[offset], velocity_prev[offset]);
                let next = advance_slot(
                    previous,
                    overlay.injection(offset).as_ref(),
                    params.dt(),
                    params.velocity_scale(),
                    params.attractor_radius(),
                );
                *position = Texel::from_vec3(next.position);
                *velocity = Texel::from_vec3(next.velocity);
            });

        self.current = 1 - self.current;
    }

    fn write_slot(&mut self, coord: UVec2, injection: &Injection) {
        let Some(offset) = self
            .grid
            .coord_to_index(coord)
            .and_then(|index| self.grid.texel_offset(index))
        else {
            return;
        };

        if let Some(position) = injection.position {
            self.positions[self.current][offset] = Texel::from_vec3(position);
        }
        if let Some(velocity) = injection.velocity {
            self.velocities[self.current][offset] = Texel::from_vec3(velocity);
        }
    }

    fn read_slot(&self, coord: UVec2) -> Result<SlotState> {
        let index = self
            .grid
            .coord_to_index(coord)
            .ok_or(SimulationError::SlotOutOfRange {
                index: coord.y.saturating_mul(self.grid.width()).saturating_add(coord.x),
                capacity: self.grid.capacity(),
            })?;
        let offset = index as usize;

        Ok(SlotState::from_texels(
            self.positions[self.current][offset],
            self.velocities[self.current][offset],
        ))
    }

    fn read_state(&self) -> Result<Vec<SlotState>> {
        Ok(self.positions[self.current]
            .iter()
            .zip(&self.velocities[self.current])
            .map(|(p, v)| SlotState::from_texels(*p, *v))
            .collect())
    }

    fn outputs(&self) -> Self::Outputs<'_> {
        SimulationOutputs {
            position: &self.positions[self.current],
            velocity: &self.velocities[self.current],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn substrate() -> CpuSubstrate {
        CpuSubstrate::new(SimulationGrid::new(3).unwrap())
    }

    #[test]
    fn test_starts_zeroed() {
        let substrate = substrate();
        let state = substrate.read_state().unwrap();
        assert_eq!(state.len(), 9);
        assert!(state.iter().all(|s| *s == SlotState::ZERO));
    }

    #[test]
    fn test_dispatch_swaps_buffers() {
        let mut substrate = substrate();
        substrate.write_slot(UVec2::new(1, 0), &Injection::new(Vec3::ZERO, Vec3::X));
        substrate.dispatch(&StepParams::new(0.5, 2.0, 1.0));

        assert_eq!(substrate.current, 1);
        let slot = substrate.read_slot(UVec2::new(1, 0)).unwrap();
        assert_eq!(slot.position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(substrate.outputs().position[1].w, 1.0);
    }

    #[test]
    fn test_uploaded_overlay_applies() {
        let grid = SimulationGrid::new(3).unwrap();
        let mut substrate = CpuSubstrate::new(grid);
        let mut overlay = InjectionOverlay::new(grid);
        overlay.stage(4, Injection::new(Vec3::new(0.5, 0.0, 0.0), Vec3::Z));

        substrate.upload_overlay(&overlay);
        substrate.dispatch(&StepParams::new(1.0, 1.0, 1.0));

        let slot = substrate.read_slot(UVec2::new(1, 1)).unwrap();
        assert_eq!(slot.position, Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(slot.velocity, Vec3::Z);
    }

    #[test]
    fn test_cleared_overlay_is_ignored() {
        let grid = SimulationGrid::new(3).unwrap();
        let mut substrate = CpuSubstrate::new(grid);
        let mut overlay = InjectionOverlay::new(grid);
        overlay.stage(2, Injection::new(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO));

        substrate.upload_overlay(&overlay);
        substrate.dispatch(&StepParams::new(0.0, 1.0, 1.0));
        overlay.settle();
        substrate.upload_overlay(&overlay);
        substrate.write_slot(UVec2::new(2, 0), &Injection::position_only(Vec3::Y * 0.5));
        substrate.dispatch(&StepParams::new(0.0, 1.0, 1.0));

        let slot = substrate.read_slot(UVec2::new(2, 0)).unwrap();
        assert_eq!(slot.position, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn test_read_slot_out_of_range() {
        assert!(substrate().read_slot(UVec2::new(3, 0)).is_err());
    }
}
