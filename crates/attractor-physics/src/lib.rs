//! # Attractor Physics
//!
//! Force model, integration step and camera math for a particle cloud pulled
//! around by a small set of fixed attractors. Everything here is plain CPU
//! math; the simulation crate runs the same step on the GPU.

pub mod attractor;
pub mod constants;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod store;
pub mod transform;

pub use attractor::*;
pub use constants::*;
pub use error::*;
pub use grid::*;
pub use integrator::*;
pub use store::*;
pub use transform::*;
