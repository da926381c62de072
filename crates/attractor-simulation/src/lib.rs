//! # Attractor Simulation
//!
//! Runs the integration step over every particle each frame, either as a
//! wgpu compute dispatch or on the rayon thread pool, and sequences it
//! against rendering through the frame driver.

pub mod backend;
pub mod cpu;
pub mod driver;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod params;
pub mod program;

#[cfg(test)]
mod test_device;

pub use backend::*;
pub use cpu::*;
pub use driver::*;
pub use error::*;
pub use frame::*;
pub use gpu::*;
pub use params::*;
pub use program::*;
