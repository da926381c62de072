//! rayon backend
//!
//! The store is moved onto the thread pool for the length of a dispatch and
//! handed back over a channel by the barrier, so nothing on the driver side
//! can touch particle state while workers are writing it.

use std::sync::mpsc::{self, Receiver};

use attractor_physics::{integrate_particle, AttractorField, IntegrationParams, ParticleStore};
use rayon::prelude::*;

use crate::error::SimulationError;
use crate::frame::{ParticleView, StepTicket, Synced};

/// Whole-buffer step, one rayon task per particle.
///
/// Each worker reads only its own `(position, velocity)` pair and the shared
/// immutable field, so no synchronisation is needed between workers.
pub fn integrate_store_parallel(
    store: &mut ParticleStore,
    field: &AttractorField,
    params: &IntegrationParams,
) {
    store.rewrite_with(|positions, velocities| {
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .for_each(|(p, v)| {
                (*p, *v) = integrate_particle(*p, *v, field, params);
            });
    });
}

enum CpuState {
    Idle(ParticleStore),
    InFlight {
        generation: u64,
        done: Receiver<ParticleStore>,
    },
    // Worker died mid-step; the state is gone.
    Lost,
}

pub struct CpuSimulation {
    state: CpuState,
    particle_count: u32,
}

impl CpuSimulation {
    pub fn new(store: ParticleStore) -> Self {
        log::info!("Initializing CPU simulation with {} particles", store.len());
        log::info!("  rayon worker threads: {}", rayon::current_num_threads());
        Self {
            particle_count: store.len() as u32,
            state: CpuState::Idle(store),
        }
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Write generation of the resident store; `None` while a step is in flight.
    pub fn generation(&self) -> Option<u64> {
        match &self.state {
            CpuState::Idle(store) => Some(store.generation()),
            _ => None,
        }
    }

    pub fn dispatch(
        &mut self,
        field: &AttractorField,
        params: &IntegrationParams,
    ) -> Result<StepTicket, SimulationError> {
        let mut store = match std::mem::replace(&mut self.state, CpuState::Lost) {
            CpuState::Idle(store) => store,
            other => {
                let err = match other {
                    CpuState::InFlight { .. } => SimulationError::StepInFlight,
                    _ => SimulationError::WorkerLost,
                };
                self.state = other;
                return Err(err);
            }
        };

        let generation = store.generation() + 1;
        let field = field.clone();
        let params = *params;
        let (tx, rx) = mpsc::channel();

        rayon::spawn(move || {
            integrate_store_parallel(&mut store, &field, &params);
            // The receiver only disappears if the simulation was dropped.
            let _ = tx.send(store);
        });

        log::trace!("dispatched CPU step for generation {generation}");
        self.state = CpuState::InFlight {
            generation,
            done: rx,
        };
        Ok(StepTicket::new(generation))
    }

    /// Block until the in-flight step has rewritten every particle.
    pub fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError> {
        let (generation, done) = match std::mem::replace(&mut self.state, CpuState::Lost) {
            CpuState::InFlight { generation, done } => (generation, done),
            other => {
                let err = match other {
                    CpuState::Idle(_) => SimulationError::NoStepInFlight,
                    _ => SimulationError::WorkerLost,
                };
                self.state = other;
                return Err(err);
            }
        };

        if ticket.generation() != generation {
            let found = ticket.generation();
            self.state = CpuState::InFlight { generation, done };
            return Err(SimulationError::TicketMismatch {
                expected: generation,
                found,
            });
        }

        let store = done.recv().map_err(|_| SimulationError::WorkerLost)?;
        debug_assert_eq!(store.generation(), generation);
        self.state = CpuState::Idle(store);
        Ok(Synced::new(generation))
    }

    pub fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError> {
        match &self.state {
            CpuState::Idle(store) if store.generation() == synced.generation() => {
                Ok(ParticleView::Host(store))
            }
            CpuState::Idle(store) => Err(SimulationError::StaleFrame {
                expected: store.generation(),
                found: synced.generation(),
            }),
            CpuState::InFlight { .. } => Err(SimulationError::StepInFlight),
            CpuState::Lost => Err(SimulationError::WorkerLost),
        }
    }

    /// Synced token for the state as it is right now, for reading the
    /// initial state before any step has run.
    pub fn synced(&self) -> Result<Synced, SimulationError> {
        self.generation()
            .map(Synced::new)
            .ok_or(SimulationError::StepInFlight)
    }
}
