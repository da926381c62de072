//! Tokens that encode the dispatch → barrier → read handoff
//!
//! `dispatch` hands out a [`StepTicket`]; only `barrier` turns it into a
//! [`Synced`], and particle state can only be read with a `Synced` whose
//! generation equals the store's current write generation.

use attractor_physics::ParticleStore;

/// Proof that a step was dispatched and has not been joined yet
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dispatched step must be passed to `barrier` before particle state is read"]
pub struct StepTicket {
    generation: u64,
}

impl StepTicket {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    /// Write generation the store reaches once this step completes
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Proof that every write of the step for `generation` has completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synced {
    generation: u64,
}

impl Synced {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Read-only access to particle state after the barrier
#[derive(Debug, Clone, Copy)]
pub enum ParticleView<'a> {
    /// State lives in host memory (rayon backend)
    Host(&'a ParticleStore),
    /// State lives in a GPU storage buffer usable as vertex input
    Device {
        positions: &'a wgpu::Buffer,
        count: u32,
    },
}

impl ParticleView<'_> {
    pub fn particle_count(&self) -> u32 {
        match self {
            ParticleView::Host(store) => store.len() as u32,
            ParticleView::Device { count, .. } => *count,
        }
    }
}
