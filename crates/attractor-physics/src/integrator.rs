//! Per-particle integration step
//!
//! This is the reference semantics for the compute kernel in
//! `attractor-simulation/src/shaders/integrate.wgsl`; the two must stay in
//! lock-step.

use glam::{Vec3, Vec4};

use crate::attractor::{AttractorField, FieldSample};
use crate::constants::{DELTA_T, MAX_DIST, PARTICLE_INV_MASS};

/// Which attractor distance decides that a particle has escaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapePolicy {
    /// Only the distance to the last attractor in the field is checked.
    /// The force from the other attractors is still summed but thrown away
    /// when the particle is recycled.
    #[default]
    LastAttractor,
    /// A particle is recycled only once it is beyond the limit from every
    /// attractor.
    AllAttractors,
}

impl EscapePolicy {
    /// Numeric tag used by the GPU kernel
    pub fn as_u32(self) -> u32 {
        match self {
            EscapePolicy::LastAttractor => 0,
            EscapePolicy::AllAttractors => 1,
        }
    }

    pub fn escaped(self, sample: &FieldSample, max_distance: f32) -> bool {
        let distance = match self {
            EscapePolicy::LastAttractor => sample.last_distance,
            EscapePolicy::AllAttractors => sample.min_distance,
        };
        distance.is_some_and(|d| d > max_distance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationParams {
    pub delta_t: f32,
    pub inverse_mass: f32,
    pub max_distance: f32,
    pub escape: EscapePolicy,
}

impl Default for IntegrationParams {
    fn default() -> Self {
        Self {
            delta_t: DELTA_T,
            inverse_mass: PARTICLE_INV_MASS,
            max_distance: MAX_DIST,
            escape: EscapePolicy::LastAttractor,
        }
    }
}

/// Where escaped particles are sent
pub const RECYCLE_POSITION: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Advance one particle by one step of semi-implicit Euler.
///
/// Returns the next `(position, velocity)`. An escaped particle is moved to
/// [`RECYCLE_POSITION`] and keeps its velocity untouched.
pub fn integrate_particle(
    position: Vec4,
    velocity: Vec4,
    field: &AttractorField,
    params: &IntegrationParams,
) -> (Vec4, Vec4) {
    let p = position.truncate();
    let sample = field.sample(p);

    if params.escape.escaped(&sample, params.max_distance) {
        return (RECYCLE_POSITION, velocity);
    }

    let dt = params.delta_t;
    let v: Vec3 = velocity.truncate();
    let a = sample.force * params.inverse_mass;

    let next_p = p + v * dt + 0.5 * a * dt * dt;
    let next_v = v + a * dt;
    (next_p.extend(1.0), next_v.extend(0.0))
}

/// Sequential whole-buffer step. Backends parallelise the same loop.
pub fn integrate_slices(
    positions: &mut [Vec4],
    velocities: &mut [Vec4],
    field: &AttractorField,
    params: &IntegrationParams,
) {
    for (p, v) in positions.iter_mut().zip(velocities.iter_mut()) {
        (*p, *v) = integrate_particle(*p, *v, field, params);
    }
}
