use attractor_physics::PhysicsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error("failed to allocate {label} ({bytes} bytes): {reason}")]
    Allocation {
        label: &'static str,
        bytes: u64,
        reason: String,
    },

    #[error(
        "{particles} particles need more compute workgroups than the device allows \
         ({max_workgroups} per dimension)"
    )]
    DispatchTooLarge { particles: u32, max_workgroups: u32 },

    #[error("waiting for the integration step failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("integration worker exited before handing the particle state back")]
    WorkerLost,

    #[error("an integration step is already in flight")]
    StepInFlight,

    #[error("barrier called with no integration step in flight")]
    NoStepInFlight,

    #[error("step ticket for generation {found} does not match in-flight generation {expected}")]
    TicketMismatch { expected: u64, found: u64 },

    #[error("particle state is at generation {expected} but the reader was synced at {found}")]
    StaleFrame { expected: u64, found: u64 },
}
