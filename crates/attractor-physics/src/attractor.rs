//! Fixed attractor bodies and the force they exert on particles
//!
//! The force law is inverse-*linear* in distance:
//! `F_k = (G_k / |a_k - p|) * normalize(a_k - p)`.
//! There is no softening term, so a particle sitting exactly on an attractor
//! produces a NaN force.

use glam::Vec3;

use crate::constants::{ATTRACTOR_1_POSITION, ATTRACTOR_2_POSITION, GRAVITY, MAX_ATTRACTORS};
use crate::error::PhysicsError;

/// A fixed point source pulling on every particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attractor {
    pub position: Vec3,
    pub gravity: f32,
}

impl Attractor {
    pub const fn new(position: Vec3, gravity: f32) -> Self {
        Self { position, gravity }
    }

    /// Force this attractor exerts on a particle at `p`, plus the distance between them
    pub fn pull(&self, p: Vec3) -> (Vec3, f32) {
        let d = self.position - p;
        let dist = d.length();
        ((self.gravity / dist) * d.normalize(), dist)
    }

    /// Packed `[x, y, z, gravity]` layout used in GPU uniforms
    pub fn to_array(&self) -> [f32; 4] {
        [self.position.x, self.position.y, self.position.z, self.gravity]
    }
}

/// Result of evaluating the whole field at one point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    /// Sum of every attractor's pull
    pub force: Vec3,
    /// Distance to the attractor evaluated last, `None` for an empty field
    pub last_distance: Option<f32>,
    /// Distance to the closest attractor, `None` for an empty field
    pub min_distance: Option<f32>,
}

/// The attractor set for a run. Fixed size once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AttractorField {
    attractors: Vec<Attractor>,
}

impl AttractorField {
    pub fn new(attractors: Vec<Attractor>) -> Result<Self, PhysicsError> {
        if attractors.len() > MAX_ATTRACTORS {
            return Err(PhysicsError::TooManyAttractors {
                count: attractors.len(),
                max: MAX_ATTRACTORS,
            });
        }
        Ok(Self { attractors })
    }

    /// A field with no attractors; every particle drifts with its own velocity.
    pub fn empty() -> Self {
        Self {
            attractors: Vec::new(),
        }
    }

    /// The two black holes at `(±5, 0, 0)` with `G = 1000`
    pub fn reference() -> Self {
        Self {
            attractors: vec![
                Attractor::new(ATTRACTOR_1_POSITION, GRAVITY),
                Attractor::new(ATTRACTOR_2_POSITION, GRAVITY),
            ],
        }
    }

    pub fn attractors(&self) -> &[Attractor] {
        &self.attractors
    }

    pub fn len(&self) -> usize {
        self.attractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attractors.is_empty()
    }

    /// Total force on a particle at `p`
    pub fn force_at(&self, p: Vec3) -> Vec3 {
        self.sample(p).force
    }

    /// Evaluate attractors in order, accumulating force and tracking distances.
    pub fn sample(&self, p: Vec3) -> FieldSample {
        let mut force = Vec3::ZERO;
        let mut last_distance = None;
        let mut min_distance: Option<f32> = None;

        for attractor in &self.attractors {
            let (pull, dist) = attractor.pull(p);
            force += pull;
            last_distance = Some(dist);
            min_distance = Some(min_distance.map_or(dist, |m| m.min(dist)));
        }

        FieldSample {
            force,
            last_distance,
            min_distance,
        }
    }
}

impl Default for AttractorField {
    fn default() -> Self {
        Self::reference()
    }
}
