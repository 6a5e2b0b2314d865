//! Simulation configuration and the per-step uniform

use bytemuck::{Pod, Zeroable};
use particle_physics::{ATTRACTOR_RADIUS, GRID_WIDTH, VELOCITY_SCALE};

/// Uniform block shared by both step kernels (matches `StepParams` in WGSL).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct StepParams {
    // x: dt, y: velocity_scale, z: attractor_radius, w: padding
    pub integration: [f32; 4],
}

impl StepParams {
    pub fn new(dt: f32, velocity_scale: f32, attractor_radius: f32) -> Self {
        Self {
            integration: [dt, velocity_scale, attractor_radius, 0.0],
        }
    }

    pub fn dt(&self) -> f32 {
        self.integration[0]
    }

    pub fn velocity_scale(&self) -> f32 {
        self.integration[1]
    }

    pub fn attractor_radius(&self) -> f32 {
        self.integration[2]
    }
}

/// How `add_item` gets new state into the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionMode {
    /// Values go to the injection overlay and are consumed by the next step.
    Staged,
    /// Values are written straight into the live state textures.
    ///
    /// Velocity is only written when `inject_velocity` is set.
    Direct { inject_velocity: bool },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Edge length N of the slot grid
    pub grid_width: u32,
    /// K in `p' = p + v·dt·K`
    pub velocity_scale: f32,
    pub attractor_radius: f32,
    pub injection: InjectionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_width: GRID_WIDTH,
            velocity_scale: VELOCITY_SCALE,
            attractor_radius: ATTRACTOR_RADIUS,
            injection: InjectionMode::Staged,
        }
    }
}

impl SimulationConfig {
    pub fn with_grid_width(mut self, grid_width: u32) -> Self {
        self.grid_width = grid_width;
        self
    }

    pub fn with_velocity_scale(mut self, velocity_scale: f32) -> Self {
        self.velocity_scale = velocity_scale;
        self
    }

    pub fn with_attractor_radius(mut self, attractor_radius: f32) -> Self {
        self.attractor_radius = attractor_radius;
        self
    }

    pub fn with_injection(mut self, injection: InjectionMode) -> Self {
        self.injection = injection;
        self
    }

    /// Uniform contents for a step of length `dt`.
    pub fn step_params(&self, dt: f32) -> StepParams {
        StepParams::new(dt, self.velocity_scale, self.attractor_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<StepParams>(), 16);
    }

    #[test]
    fn test_step_params_from_config() {
        let config = SimulationConfig::default()
            .with_velocity_scale(2.0)
            .with_attractor_radius(3.0);
        let params = config.step_params(0.5);
        assert_eq!(params.dt(), 0.5);
        assert_eq!(params.velocity_scale(), 2.0);
        assert_eq!(params.attractor_radius(), 3.0);
    }

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.grid_width, 250);
        assert_eq!(config.velocity_scale, 15.0);
        assert_eq!(config.injection, InjectionMode::Staged);
    }
}
