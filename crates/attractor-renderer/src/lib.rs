//! # Attractor Renderer
//!
//! Draws the particle cloud as single-pixel points and the attractors as
//! screen-space billboards, both through the frame's model, view and
//! projection matrices.

pub mod camera;
pub mod error;
pub mod renderer;

pub use camera::*;
pub use error::*;
pub use renderer::*;
