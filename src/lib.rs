//! Stillwater - Position Based Fluids for Bevy
//!
//! This library provides a Position Based Fluids (PBF) particle solver and a
//! Bevy plugin that steps it every frame.
//!
//! # Features
//!
//! - **PBF Simulation**: Density constraints solved with Jacobi iterations
//! - **Parallel Phases**: Every per-particle pass runs on rayon
//! - **Stabilization**: Artificial pressure, XSPH viscosity, vorticity confinement
//! - **Boundary Handling**: Box domain with damped reflection
//! - **Easy Integration**: Simple Bevy plugin interface
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use stillwater::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(FluidPlugin::with_params(FluidParams::water()))
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(mut staging: ResMut<ParticleStagingBuffer>) {
//!     staging.extend(ParticleBlock::new(Vec3::new(-2.0, 0.5, -2.0), UVec3::splat(10), 0.42).generate());
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`fluid`]: Core fluid simulation module
//!   - [`fluid::params`]: Simulation parameters
//!   - [`fluid::particle`]: Particle data structures
//!   - [`fluid::spatial`]: Spatial hashing for neighbor search
//!   - [`fluid::solver`]: PBF constraint solver
//!   - [`fluid::boundary`]: Boundary handling
//!   - [`fluid::simulation`]: Step orchestration
//!   - [`fluid::plugin`]: Bevy plugin

pub mod fluid;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fluid::prelude::*;
}
