use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("position buffer holds {positions} particles but velocity buffer holds {velocities}")]
    LengthMismatch { positions: usize, velocities: usize },

    #[error("attractor field holds {count} attractors, at most {max} are supported")]
    TooManyAttractors { count: usize, max: usize },

    #[error("particle grid resolution must be at least 1")]
    EmptyGrid,
}
