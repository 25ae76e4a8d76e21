//! Configuration errors for the fluid solver.
//!
//! Parameter problems are caught once, before any step runs. Numerical
//! degeneracies inside a step are never reported here; they are zeroed locally.

use thiserror::Error;

/// Invalid simulation parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The smoothing radius must be strictly positive.
    #[error("smoothing radius must be positive, got {0}")]
    NonPositiveSmoothingRadius(f32),

    /// The rest density must be strictly positive.
    #[error("rest density must be positive, got {0}")]
    NonPositiveRestDensity(f32),

    /// At least one constraint iteration is required.
    #[error("solver iterations must be at least 1")]
    ZeroSolverIterations,

    /// The timestep must be strictly positive.
    #[error("timestep must be positive, got {0}")]
    NonPositiveTimestep(f32),

    /// The particle radius cannot be negative.
    #[error("particle radius must not be negative, got {0}")]
    NegativeParticleRadius(f32),

    /// The box must leave room for a particle on every axis.
    #[error("bounds min {min:?} and max {max:?} leave no room for particles of radius {radius}")]
    InvalidBounds {
        /// Minimum corner.
        min: [f32; 3],
        /// Maximum corner.
        max: [f32; 3],
        /// Particle radius.
        radius: f32,
    },

    /// Boundary damping is a fraction.
    #[error("boundary damping must be within [0, 1], got {0}")]
    DampingOutOfRange(f32),

    /// An explicit grid cell size must be strictly positive.
    #[error("grid cell size must be positive, got {0}")]
    NonPositiveCellSize(f32),

    /// Cells much smaller than `h` make every neighbor query visit a huge block.
    #[error("grid cell size {cell_size} is below the minimum {min} for smoothing radius {smoothing_radius}")]
    CellSizeTooSmall {
        cell_size: f32,
        min: f32,
        smoothing_radius: f32,
    },
}
