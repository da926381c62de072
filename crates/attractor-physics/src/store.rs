//! Authoritative particle state: index-aligned position and velocity buffers

use glam::Vec4;

use crate::error::PhysicsError;
use crate::grid::initial_grid;

/// Position (`w = 1`) and velocity (`w = 0`) of every particle, stored as two
/// index-aligned buffers of the same fixed length.
///
/// `generation` counts whole-buffer rewrites. It starts at 0 for the initial
/// state and goes up by one every time an integration step rewrites all
/// particles.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleStore {
    positions: Vec<Vec4>,
    velocities: Vec<Vec4>,
    generation: u64,
}

impl ParticleStore {
    pub fn new(positions: Vec<Vec4>, velocities: Vec<Vec4>) -> Result<Self, PhysicsError> {
        if positions.len() != velocities.len() {
            return Err(PhysicsError::LengthMismatch {
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }
        Ok(Self {
            positions,
            velocities,
            generation: 0,
        })
    }

    /// Particles on the reference lattice, all at rest.
    pub fn grid(resolution: u32) -> Result<Self, PhysicsError> {
        let positions = initial_grid(resolution)?;
        let velocities = vec![Vec4::ZERO; positions.len()];
        Self::new(positions, velocities)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec4] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec4] {
        &self.velocities
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Byte size of one of the two buffers
    pub fn buffer_size(&self) -> u64 {
        (self.positions.len() * std::mem::size_of::<Vec4>()) as u64
    }

    /// Hand both buffers to `update`, which must rewrite every index, then
    /// bump the generation.
    pub fn rewrite_with<F>(&mut self, update: F)
    where
        F: FnOnce(&mut [Vec4], &mut [Vec4]),
    {
        update(&mut self.positions, &mut self.velocities);
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffers() {
        let err = ParticleStore::new(vec![Vec4::W; 3], vec![Vec4::ZERO; 2]).unwrap_err();
        assert_eq!(
            err,
            PhysicsError::LengthMismatch {
                positions: 3,
                velocities: 2
            }
        );
    }

    #[test]
    fn grid_store_starts_at_rest() {
        let store = ParticleStore::grid(4).unwrap();
        assert_eq!(store.len(), 64);
        assert_eq!(store.positions().len(), store.velocities().len());
        assert!(store.velocities().iter().all(|v| *v == Vec4::ZERO));
        assert_eq!(store.generation(), 0);
        assert_eq!(store.buffer_size(), 64 * 16);
    }

    #[test]
    fn rewrite_bumps_generation() {
        let mut store = ParticleStore::grid(2).unwrap();
        store.rewrite_with(|positions, _| {
            for p in positions.iter_mut() {
                p.x += 1.0;
            }
        });
        assert_eq!(store.generation(), 1);
        assert_eq!(store.positions()[0], Vec4::new(1.0, 0.0, 0.0, 1.0));
    }
}
