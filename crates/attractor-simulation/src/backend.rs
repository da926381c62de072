//! The seam between the frame driver and an integration backend

use attractor_physics::{AttractorField, IntegrationParams};

use crate::cpu::CpuSimulation;
use crate::error::SimulationError;
use crate::frame::{ParticleView, StepTicket, Synced};
use crate::gpu::GpuSimulation;

/// A data-parallel integration step over the particle state store.
///
/// `dispatch` starts a step and must not be called again before `barrier`
/// has joined it. `view` only succeeds for a `Synced` from the latest
/// barrier.
pub trait Integrator {
    fn particle_count(&self) -> u32;

    fn dispatch(
        &mut self,
        field: &AttractorField,
        params: &IntegrationParams,
    ) -> Result<StepTicket, SimulationError>;

    fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError>;

    fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError>;
}

impl Integrator for CpuSimulation {
    fn particle_count(&self) -> u32 {
        CpuSimulation::particle_count(self)
    }

    fn dispatch(
        &mut self,
        field: &AttractorField,
        params: &IntegrationParams,
    ) -> Result<StepTicket, SimulationError> {
        CpuSimulation::dispatch(self, field, params)
    }

    fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError> {
        CpuSimulation::barrier(self, ticket)
    }

    fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError> {
        CpuSimulation::view(self, synced)
    }
}

impl Integrator for GpuSimulation {
    fn particle_count(&self) -> u32 {
        GpuSimulation::particle_count(self)
    }

    fn dispatch(
        &mut self,
        field: &AttractorField,
        params: &IntegrationParams,
    ) -> Result<StepTicket, SimulationError> {
        GpuSimulation::dispatch(self, field, params)
    }

    fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError> {
        GpuSimulation::barrier(self, ticket)
    }

    fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError> {
        GpuSimulation::view(self, synced)
    }
}

/// Backend picked at startup
pub enum Backend {
    Gpu(GpuSimulation),
    Cpu(CpuSimulation),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Gpu(_) => "gpu",
            Backend::Cpu(_) => "cpu",
        }
    }
}

impl Integrator for Backend {
    fn particle_count(&self) -> u32 {
        match self {
            Backend::Gpu(sim) => sim.particle_count(),
            Backend::Cpu(sim) => sim.particle_count(),
        }
    }

    fn dispatch(
        &mut self,
        field: &AttractorField,
        params: &IntegrationParams,
    ) -> Result<StepTicket, SimulationError> {
        match self {
            Backend::Gpu(sim) => sim.dispatch(field, params),
            Backend::Cpu(sim) => sim.dispatch(field, params),
        }
    }

    fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError> {
        match self {
            Backend::Gpu(sim) => sim.barrier(ticket),
            Backend::Cpu(sim) => sim.barrier(ticket),
        }
    }

    fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError> {
        match self {
            Backend::Gpu(sim) => sim.view(synced),
            Backend::Cpu(sim) => sim.view(synced),
        }
    }
}
