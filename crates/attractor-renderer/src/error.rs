use attractor_simulation::SimulationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to allocate {label} ({bytes} bytes): {reason}")]
    Allocation {
        label: &'static str,
        bytes: u64,
        reason: String,
    },

    #[error("{count} host particles to draw but only {reserved} reserved")]
    UnreservedHostParticles { count: u32, reserved: u32 },
}
