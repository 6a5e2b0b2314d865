//! Orbiting point masses
//!
//! Registers one orbiter per grid column, then drives the simulation from a
//! fixed-rate frame loop and logs a few orbiters as they fall toward the
//! attractor. Runs on the GPU when an adapter is available, otherwise on the CPU.

use glam::{Vec2, Vec3};
use particle_simulation::{
    ComputeSubstrate, CpuSimulation, GpuContext, GpuSimulation, SimulationConfig,
    SimulationController, SimulationError,
};
use rand::Rng;
use std::time::{Duration, Instant};

const FRAME_COUNT: u32 = 600;
const FRAME_TIME: Duration = Duration::from_micros(16_667);
const SPAWN_SPACING: f32 = 10.0;
const LOG_EVERY: u32 = 60;

/// A simulated body: its slot in the state textures and the UV a renderer
/// samples them with.
#[derive(Debug, Clone, Copy)]
struct Orbiter {
    slot: u32,
    uv: Vec2,
}

impl Orbiter {
    fn spawn<S: ComputeSubstrate>(
        simulation: &mut SimulationController<S>,
        position: Vec3,
        velocity: Vec3,
    ) -> Result<Self, SimulationError> {
        let slot = simulation.add_item(position, velocity)?;
        let uv = simulation.grid().texel_uv(slot).unwrap_or_default();
        Ok(Self { slot, uv })
    }
}

/// One orbiter per grid column, spaced out along +X with a random velocity in the unit cube.
fn spawn_orbiters<S: ComputeSubstrate>(
    simulation: &mut SimulationController<S>,
) -> Result<Vec<Orbiter>, SimulationError> {
    let mut rng = rand::rng();
    let count = simulation.grid().width();

    let orbiters = (0..count)
        .map(|i| {
            let position = Vec3::new(i as f32 * SPAWN_SPACING, 0.0, 0.0);
            let velocity = Vec3::new(rng.random(), rng.random(), rng.random());
            Orbiter::spawn(simulation, position, velocity)
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("✓ Spawned {} orbiters", orbiters.len());
    for orbiter in orbiters.iter().take(3) {
        log::info!("    slot {} -> uv {:?}", orbiter.slot, orbiter.uv);
    }

    Ok(orbiters)
}

fn run<S: ComputeSubstrate>(mut simulation: SimulationController<S>) -> Result<(), SimulationError> {
    let orbiters = spawn_orbiters(&mut simulation)?;
    let sampled: Vec<Orbiter> = orbiters
        .iter()
        .copied()
        .step_by((orbiters.len() / 4).max(1))
        .collect();

    // The first frame has no previous timestamp, so its elapsed time is undefined.
    let mut last_frame: Option<Instant> = None;

    for frame in 0..FRAME_COUNT {
        let now = Instant::now();
        let dt = last_frame.map_or(f32::NAN, |t| (now - t).as_secs_f32());
        last_frame = Some(now);

        simulation.step(dt);

        if frame % LOG_EVERY == 0 {
            for orbiter in &sampled {
                let state = simulation.read_slot(orbiter.slot)?;
                log::info!(
                    "frame {:4} slot {:5}: |p| = {:8.3}, |v| = {:6.3}",
                    frame,
                    orbiter.slot,
                    state.position.length(),
                    state.velocity.length()
                );
            }
        }

        if let Some(remaining) = FRAME_TIME.checked_sub(now.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    log::info!("Finished after {} steps", simulation.step_count());
    Ok(())
}

fn main() -> Result<(), SimulationError> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting orbit simulation...");
    let config = SimulationConfig::default();

    match pollster::block_on(GpuContext::headless()) {
        Ok(context) => {
            let simulation = pollster::block_on(GpuSimulation::from_context(&context, config))?;
            run(simulation)
        }
        Err(e) => {
            log::warn!("{}; falling back to the CPU substrate", e);
            run(CpuSimulation::new_cpu(config)?)
        }
    }
}
