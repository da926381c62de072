//! Reference constants for the two black-hole scene.

use glam::Vec3;

/// Integration timestep per frame
pub const DELTA_T: f32 = 0.0005;

/// Mass of every particle
pub const PARTICLE_MASS: f32 = 0.1;

/// Inverse of [`PARTICLE_MASS`], the value the integrator actually uses
pub const PARTICLE_INV_MASS: f32 = 1.0 / PARTICLE_MASS;

/// Particles further than this from the checked attractor are recycled to the origin
pub const MAX_DIST: f32 = 45.0;

/// Strength of each reference attractor
pub const GRAVITY: f32 = 1000.0;

pub const ATTRACTOR_1_POSITION: Vec3 = Vec3::new(5.0, 0.0, 0.0);
pub const ATTRACTOR_2_POSITION: Vec3 = Vec3::new(-5.0, 0.0, 0.0);

/// Upper bound on attractors in one field (size of the GPU uniform array)
pub const MAX_ATTRACTORS: usize = 8;

/// Particles per grid axis; the run holds `GRID_RESOLUTION³` particles
pub const GRID_RESOLUTION: u32 = 100;

/// Edge length of the initial particle cube `[0, GRID_EXTENT]³`
pub const GRID_EXTENT: f32 = 2.0;
