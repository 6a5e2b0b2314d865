//! Simulation controller
//!
//! Hands out slots, stages injections and advances the substrate once per frame.
//!
//! NOTE: Slot indices are handed out sequentially and never reused. Once all N²
//! slots are taken `add_item` fails instead of wrapping back to slot 0.

use crate::context::GpuContext;
use crate::cpu::CpuSubstrate;
use crate::gpu::GpuSubstrate;
use crate::injection::InjectionOverlay;
use crate::substrate::ComputeSubstrate;
use crate::{InjectionMode, Result, SimulationConfig, SimulationError};
use glam::Vec3;
use particle_physics::{Injection, SimulationGrid, SlotState, SlotTag};

/// Controller running on the GPU.
pub type GpuSimulation = SimulationController<GpuSubstrate>;
/// Controller running on the CPU thread pool.
pub type CpuSimulation = SimulationController<CpuSubstrate>;

pub struct SimulationController<S: ComputeSubstrate> {
    substrate: S,
    config: SimulationConfig,
    grid: SimulationGrid,
    overlay: InjectionOverlay,
    next_slot: u32,
    step_count: u64,
}

impl SimulationController<GpuSubstrate> {
    /// Build a controller on an existing device.
    pub async fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: SimulationConfig,
    ) -> Result<Self> {
        let grid = grid_for(&config)?;
        let substrate = GpuSubstrate::new(device, queue, grid).await?;
        Self::with_substrate(substrate, config)
    }

    pub async fn from_context(context: &GpuContext, config: SimulationConfig) -> Result<Self> {
        Self::new(context.device.clone(), context.queue.clone(), config).await
    }
}

impl SimulationController<CpuSubstrate> {
    pub fn new_cpu(config: SimulationConfig) -> Result<Self> {
        let grid = grid_for(&config)?;
        Self::with_substrate(CpuSubstrate::new(grid), config)
    }
}

fn grid_for(config: &SimulationConfig) -> Result<SimulationGrid> {
    SimulationGrid::new(config.grid_width)
        .ok_or(SimulationError::InvalidGridWidth(config.grid_width))
}

impl<S: ComputeSubstrate> SimulationController<S> {
    /// Wrap an initialized substrate.
    ///
    /// Runs one zero-length step so that [`Self::outputs`] is valid before the
    /// first frame.
    pub fn with_substrate(substrate: S, config: SimulationConfig) -> Result<Self> {
        let grid = grid_for(&config)?;
        if substrate.grid() != grid {
            return Err(SimulationError::InvalidGridWidth(substrate.grid().width()));
        }

        let mut controller = Self {
            substrate,
            config,
            grid,
            overlay: InjectionOverlay::new(grid),
            next_slot: 0,
            step_count: 0,
        };
        controller.step(0.0);

        log::info!(
            "✓ Simulation ready: {} slots, injection {:?}",
            grid.capacity(),
            config.injection
        );
        Ok(controller)
    }

    /// Advance every slot by `dt` seconds.
    ///
    /// A non-finite `dt` (e.g. the first frame's undefined elapsed time) skips
    /// the step and leaves the outputs untouched. Returns whether a step ran.
    pub fn step(&mut self, dt: f32) -> bool {
        if !dt.is_finite() {
            log::warn!("Skipping step: dt was {}", dt);
            return false;
        }

        if self.overlay.is_dirty() {
            self.substrate.upload_overlay(&self.overlay);
            self.overlay.mark_uploaded();
        }

        self.substrate.dispatch(&self.config.step_params(dt));

        // Flags are cleared here and re-uploaded before the next dispatch.
        let settled = self.overlay.settle();
        if settled > 0 {
            log::debug!("Step {}: applied {} injections", self.step_count, settled);
        }

        self.step_count += 1;
        true
    }

    /// Register a particle and return its slot.
    ///
    /// In [`InjectionMode::Staged`] the values take effect on the next step. In
    /// [`InjectionMode::Direct`] they are written into the current state now.
    pub fn add_item(&mut self, position: Vec3, velocity: Vec3) -> Result<u32> {
        let capacity = self.grid.capacity();
        let index = self.next_slot;
        let Some(coord) = self.grid.index_to_coord(index) else {
            log::warn!("Rejecting particle: all {} slots are in use", capacity);
            return Err(SimulationError::CapacityExceeded { capacity });
        };

        match self.config.injection {
            InjectionMode::Staged => {
                self.overlay.stage(index, Injection::new(position, velocity));
            }
            InjectionMode::Direct { inject_velocity } => {
                let injection = if inject_velocity {
                    Injection::new(position, velocity)
                } else {
                    Injection::position_only(position)
                };
                self.substrate.write_slot(coord, &injection);
                self.overlay.mark_settled(index);
            }
        }

        self.next_slot += 1;
        Ok(index)
    }

    /// Handles to the most recent position and velocity buffers.
    ///
    /// The borrow ends before the next [`Self::step`], so a stale handle can't outlive it.
    pub fn outputs(&self) -> S::Outputs<'_> {
        self.substrate.outputs()
    }

    /// Read one slot's current state back to the host.
    pub fn read_slot(&self, index: u32) -> Result<SlotState> {
        let coord = self
            .grid
            .index_to_coord(index)
            .ok_or(SimulationError::SlotOutOfRange {
                index,
                capacity: self.grid.capacity(),
            })?;
        self.substrate.read_slot(coord)
    }

    /// Read every slot back to the host, in index order.
    pub fn read_all(&self) -> Result<Vec<SlotState>> {
        self.substrate.read_state()
    }

    /// Total number of slots (N²).
    pub fn capacity(&self) -> u32 {
        self.grid.capacity()
    }

    /// Number of slots handed out so far.
    pub fn len(&self) -> u32 {
        self.next_slot
    }

    pub fn is_empty(&self) -> bool {
        self.next_slot == 0
    }

    pub fn remaining(&self) -> u32 {
        self.capacity() - self.next_slot
    }

    pub fn grid(&self) -> SimulationGrid {
        self.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Injections waiting for the next step.
    pub fn pending_injections(&self) -> usize {
        self.overlay.pending_count()
    }

    pub fn slot_tag(&self, index: u32) -> Option<&SlotTag> {
        self.overlay.tag(index)
    }

    /// Steps run so far, including the zero-length one at construction.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CpuSimulation {
        CpuSimulation::new_cpu(SimulationConfig::default().with_grid_width(4)).unwrap()
    }

    #[test]
    fn test_construction_runs_zero_step() {
        let sim = small();
        assert_eq!(sim.step_count(), 1);
        assert_eq!(sim.capacity(), 16);
        assert!(sim.is_empty());
    }

    #[test]
    fn test_invalid_width() {
        let result = CpuSimulation::new_cpu(SimulationConfig::default().with_grid_width(0));
        assert!(matches!(result, Err(SimulationError::InvalidGridWidth(0))));
    }

    #[test]
    fn test_mismatched_substrate() {
        let substrate = CpuSubstrate::new(SimulationGrid::new(3).unwrap());
        let result = SimulationController::with_substrate(
            substrate,
            SimulationConfig::default().with_grid_width(4),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_staged_injection_waits_for_step() {
        let mut sim = small();
        let slot = sim.add_item(Vec3::new(2.0, 0.0, 0.0), Vec3::ZERO).unwrap();

        assert_eq!(sim.pending_injections(), 1);
        assert!(matches!(sim.slot_tag(slot), Some(SlotTag::Pending(_))));
        assert_eq!(sim.read_slot(slot).unwrap(), SlotState::ZERO);

        assert!(sim.step(0.0));
        assert_eq!(sim.pending_injections(), 0);
        assert_eq!(sim.slot_tag(slot), Some(&SlotTag::Settled));
        assert_eq!(sim.read_slot(slot).unwrap().position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_direct_injection_is_immediate() {
        let config = SimulationConfig::default()
            .with_grid_width(4)
            .with_injection(InjectionMode::Direct {
                inject_velocity: false,
            });
        let mut sim = CpuSimulation::new_cpu(config).unwrap();
        let slot = sim.add_item(Vec3::new(0.0, 3.0, 0.0), Vec3::X).unwrap();

        let state = sim.read_slot(slot).unwrap();
        assert_eq!(state.position, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(state.velocity, Vec3::ZERO);
        assert_eq!(sim.pending_injections(), 0);
    }

    #[test]
    fn test_direct_injection_with_velocity() {
        let config = SimulationConfig::default()
            .with_grid_width(2)
            .with_injection(InjectionMode::Direct {
                inject_velocity: true,
            });
        let mut sim = CpuSimulation::new_cpu(config).unwrap();
        let slot = sim.add_item(Vec3::ZERO, Vec3::X).unwrap();
        assert_eq!(sim.read_slot(slot).unwrap().velocity, Vec3::X);
    }

    #[test]
    fn test_read_slot_out_of_range() {
        let sim = small();
        assert!(matches!(
            sim.read_slot(16),
            Err(SimulationError::SlotOutOfRange {
                index: 16,
                capacity: 16
            })
        ));
    }

    #[test]
    fn test_remaining() {
        let mut sim = small();
        sim.add_item(Vec3::ZERO, Vec3::ZERO).unwrap();
        assert_eq!(sim.len(), 1);
        assert_eq!(sim.remaining(), 15);
    }
}
