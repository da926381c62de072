//! Uniform block consumed by the integration kernel

use attractor_physics::{AttractorField, IntegrationParams, MAX_ATTRACTORS};
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SimulationParams {
    // x: delta_t, y: inverse_mass, z: max_distance, w: padding
    pub integration: [f32; 4],

    // x: particle_count, y: attractor_count, z: escape_policy, w: padding
    pub counts: [u32; 4],

    // xyz: position, w: gravity
    pub attractors: [[f32; 4]; MAX_ATTRACTORS],
}

impl SimulationParams {
    pub fn new(particle_count: u32, field: &AttractorField, params: &IntegrationParams) -> Self {
        let mut attractors = [[0.0; 4]; MAX_ATTRACTORS];
        // AttractorField never holds more than MAX_ATTRACTORS.
        for (slot, attractor) in attractors.iter_mut().zip(field.attractors()) {
            *slot = attractor.to_array();
        }

        Self {
            integration: [params.delta_t, params.inverse_mass, params.max_distance, 0.0],
            counts: [
                particle_count,
                field.len() as u32,
                params.escape.as_u32(),
                0,
            ],
            attractors,
        }
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::new(0, &AttractorField::reference(), &IntegrationParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attractor_physics::EscapePolicy;

    #[test]
    fn layout_matches_wgsl_uniform() {
        // vec4<f32> + vec4<u32> + array<vec4<f32>, 8>
        assert_eq!(std::mem::size_of::<SimulationParams>(), 16 + 16 + 16 * MAX_ATTRACTORS);
    }

    #[test]
    fn packs_reference_scene() {
        let params = IntegrationParams {
            escape: EscapePolicy::AllAttractors,
            ..IntegrationParams::default()
        };
        let packed = SimulationParams::new(1_000_000, &AttractorField::reference(), &params);

        assert_eq!(packed.integration, [0.0005, 10.0, 45.0, 0.0]);
        assert_eq!(packed.counts, [1_000_000, 2, 1, 0]);
        assert_eq!(packed.attractors[0], [5.0, 0.0, 0.0, 1000.0]);
        assert_eq!(packed.attractors[1], [-5.0, 0.0, 0.0, 1000.0]);
        assert_eq!(packed.attractors[2], [0.0; 4]);
    }
}
