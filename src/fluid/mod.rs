//! Position Based Fluids (PBF) simulation module.
//!
//! A CPU particle solver following "Position Based Fluids" (Macklin &
//! Müller, 2013): density constraints projected with Jacobi iterations,
//! artificial pressure against particle clumping, XSPH viscosity and
//! vorticity confinement. Every per-particle phase runs in parallel.
//!
//! # Architecture
//!
//! The simulation is structured in the following components:
//!
//! - [`params`]: Simulation parameters and their validation
//! - [`particle`]: Particle data structures and block spawning
//! - [`kernels`]: SPH smoothing kernels
//! - [`spatial`]: Spatial hashing for efficient neighbor search
//! - [`neighbors`]: Per-step neighbor lists
//! - [`solver`]: PBF constraint solver (density constraints)
//! - [`postprocess`]: Velocity update, vorticity confinement and XSPH
//! - [`boundary`]: Boundary handling and collision detection
//! - [`simulation`]: Step orchestration and the simulation resource
//! - [`stats`]: Density diagnostics
//! - [`drivers`]: Per-frame parameter drivers
//! - [`plugin`]: Bevy plugin for easy integration
//!
//! # Example
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use stillwater::fluid::prelude::*;
//!
//! let params = FluidParams::water();
//! let mut particles = ParticleBlock::new(Vec3::new(-1.0, 0.5, -1.0), UVec3::splat(8), 0.4)
//!     .generate();
//!
//! let mut solver = PbfSolver::new(params).unwrap();
//! for _ in 0..100 {
//!     solver.step(&mut particles);
//! }
//! ```

pub mod boundary;
pub mod drivers;
pub mod error;
pub mod kernels;
pub mod neighbors;
pub mod params;
pub mod particle;
pub mod plugin;
pub mod postprocess;
pub mod simulation;
pub mod solver;
pub mod spatial;
pub mod stats;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::boundary::*;
    pub use super::drivers::*;
    pub use super::error::*;
    pub use super::kernels::*;
    pub use super::params::*;
    pub use super::particle::*;
    pub use super::plugin::*;
    pub use super::simulation::*;
    pub use super::stats::*;
}
