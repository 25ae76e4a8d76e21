//! Fluid simulation core logic.
//!
//! [`PbfSolver`] sequences the solver components into one simulation step:
//!
//! ```text
//! PredictVelocityAndPosition -> BuildGrid
//!   -> [ComputeDensity -> ComputeLambda -> ComputeCorrection
//!       -> ApplyCorrection -> EnforcePredictedBoundary] x solver_iterations
//!   -> UpdateVelocity -> VorticityConfinement -> XsphViscosity
//!   -> EnforceFinalBoundary
//! ```
//!
//! Nothing but the particle array carries over from one step to the next.
//! A step has no rollback: if it is interrupted, the scratch fields of the
//! particles are in an unspecified state.

use std::fmt;

use bevy::log::{debug, trace};
use bevy::prelude::*;
use rayon::prelude::*;

use super::boundary::BoundaryEnforcer;
use super::error::ConfigError;
use super::neighbors::NeighborLists;
use super::params::FluidParams;
use super::particle::Particle;
use super::postprocess::{update_velocities, PostProcess};
use super::solver::ConstraintSolver;
use super::spatial::SpatialHashGrid;

/// Phases of a simulation step, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepPhase {
    PredictVelocityAndPosition,
    BuildGrid,
    // Constraint phases carry the zero-based solver iteration.
    ComputeDensity(u32),
    ComputeLambda(u32),
    ComputeCorrection(u32),
    ApplyCorrection(u32),
    EnforcePredictedBoundary(u32),
    UpdateVelocity,
    VorticityConfinement,
    XsphViscosity,
    EnforceFinalBoundary,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepPhase::PredictVelocityAndPosition => write!(f, "predict"),
            StepPhase::BuildGrid => write!(f, "build grid"),
            StepPhase::ComputeDensity(i) => write!(f, "density #{i}"),
            StepPhase::ComputeLambda(i) => write!(f, "lambda #{i}"),
            StepPhase::ComputeCorrection(i) => write!(f, "correction #{i}"),
            StepPhase::ApplyCorrection(i) => write!(f, "apply correction #{i}"),
            StepPhase::EnforcePredictedBoundary(i) => write!(f, "predicted boundary #{i}"),
            StepPhase::UpdateVelocity => write!(f, "update velocity"),
            StepPhase::VorticityConfinement => write!(f, "vorticity confinement"),
            StepPhase::XsphViscosity => write!(f, "xsph viscosity"),
            StepPhase::EnforceFinalBoundary => write!(f, "final boundary"),
        }
    }
}

/// Grid and neighbor lists over the current predicted positions.
#[derive(Debug, Default)]
struct NeighborSearch {
    grid: SpatialHashGrid,
    neighbors: NeighborLists,
    positions: Vec<Vec3>,
}

impl NeighborSearch {
    fn refresh(&mut self, particles: &[Particle], params: &FluidParams) {
        self.positions.clear();
        self.positions
            .extend(particles.iter().map(|p| p.predicted_position));
        self.grid.build(&self.positions, params.cell_size());
        self.neighbors.build(
            &self.grid,
            &self.positions,
            params.smoothing_radius,
            params.max_neighbors,
        );
    }
}

/// CPU Position Based Fluids solver.
///
/// Holds validated parameters and reusable scratch storage. Neighbors are
/// looked up again before every constraint iteration and before the velocity
/// passes, so pairs that come within `h` during the solve interact.
#[derive(Debug, Default)]
pub struct PbfSolver {
    params: FluidParams,
    search: NeighborSearch,
}

impl PbfSolver {
    /// Create a solver, validating the parameters.
    pub fn new(params: FluidParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            params,
            ..default()
        })
    }

    /// Current parameters.
    pub fn params(&self) -> &FluidParams {
        &self.params
    }

    /// Replace the parameters for subsequent steps. On error the previous
    /// parameters stay in effect.
    pub fn set_params(&mut self, params: FluidParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Neighbor lists over the final positions of the last step.
    pub fn neighbors(&self) -> &NeighborLists {
        &self.search.neighbors
    }

    /// Advance the particles by one step of `params.dt`.
    pub fn step(&mut self, particles: &mut [Particle]) {
        self.step_observed(particles, |_, _| {});
    }

    /// Like [`Self::step`], calling `observer` after every completed phase.
    pub fn step_observed(
        &mut self,
        particles: &mut [Particle],
        mut observer: impl FnMut(StepPhase, &[Particle]),
    ) {
        if particles.is_empty() {
            return;
        }

        let params = &self.params;
        let dt = params.dt;
        let boundary = BoundaryEnforcer::new(params);

        let mut finish = |phase: StepPhase, particles: &[Particle]| {
            trace!("pbf step: {phase} done");
            observer(phase, particles);
        };

        // 1. Apply external forces and predict positions
        let gravity = params.gravity;
        particles.par_iter_mut().for_each(|p| {
            p.velocity += gravity * dt;
            p.predicted_position = p.position + p.velocity * dt;
        });
        finish(StepPhase::PredictVelocityAndPosition, particles);

        // 2. Build spatial hash and neighbor lists
        self.search.refresh(particles, params);
        finish(StepPhase::BuildGrid, particles);

        // 3. Solve density constraints
        for i in 0..params.solver_iterations {
            if i > 0 {
                self.search.refresh(particles, params);
            }
            let solver = ConstraintSolver::new(params, &self.search.neighbors);
            solver.update_densities(particles);
            finish(StepPhase::ComputeDensity(i), particles);
            solver.update_lambdas(particles);
            finish(StepPhase::ComputeLambda(i), particles);
            solver.update_corrections(particles);
            finish(StepPhase::ComputeCorrection(i), particles);
            ConstraintSolver::apply_corrections(particles);
            finish(StepPhase::ApplyCorrection(i), particles);
            boundary.enforce_predicted(particles);
            finish(StepPhase::EnforcePredictedBoundary(i), particles);
        }

        // 4. Update velocities from position change
        self.search.refresh(particles, params);
        update_velocities(particles, dt);
        finish(StepPhase::UpdateVelocity, particles);

        // 5. Vorticity confinement and XSPH viscosity
        let post = PostProcess::new(params, &self.search.neighbors);
        post.apply_vorticity_confinement(particles);
        finish(StepPhase::VorticityConfinement, particles);
        post.apply_xsph_viscosity(particles);
        finish(StepPhase::XsphViscosity, particles);

        // 6. Final boundary pass
        boundary.enforce_final(particles);
        finish(StepPhase::EnforceFinalBoundary, particles);

        debug!(
            "pbf step: {} particles, {} cells, {:.1} neighbors/particle",
            particles.len(),
            self.search.grid.cell_count(),
            self.search.neighbors.average_count()
        );
    }
}

/// Validate `params` and advance `particles` by one step.
///
/// Convenience for callers that do not keep a [`PbfSolver`] around; scratch
/// storage is allocated per call.
pub fn step(particles: &mut [Particle], params: &FluidParams) -> Result<(), ConfigError> {
    let mut solver = PbfSolver::new(params.clone())?;
    solver.step(particles);
    Ok(())
}

/// Resource for staging particles before they join the simulation.
#[derive(Resource, Default)]
pub struct ParticleStagingBuffer {
    pub particles: Vec<Particle>,
}

impl ParticleStagingBuffer {
    /// Adds a particle to the staging buffer.
    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Adds many particles.
    pub fn extend(&mut self, particles: impl IntoIterator<Item = Particle>) {
        self.particles.extend(particles);
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Main fluid simulation resource: the particle array and its solver.
#[derive(Resource, Default)]
pub struct FluidSimulation {
    pub particles: Vec<Particle>,
    solver: PbfSolver,
    last_error: Option<ConfigError>,
}

impl FluidSimulation {
    /// Returns the number of particles.
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Moves staged particles into the simulation. Returns how many were added.
    pub fn upload_from_staging(&mut self, staging: &mut ParticleStagingBuffer) -> usize {
        let added = staging.particles.len();
        self.particles.append(&mut staging.particles);
        added
    }

    /// The solver driving this simulation.
    pub fn solver(&self) -> &PbfSolver {
        &self.solver
    }

    /// Error of the last [`Self::advance`], if it was rejected.
    pub fn last_error(&self) -> Option<&ConfigError> {
        self.last_error.as_ref()
    }

    /// Advance one host frame of length `frame_dt`, split into
    /// `params.substeps` solver steps.
    ///
    /// Invalid parameters leave the particles untouched.
    pub fn advance(&mut self, params: &FluidParams, frame_dt: f32) -> Result<(), ConfigError> {
        let substeps = params.substeps.max(1);
        let step_params = FluidParams {
            dt: frame_dt / substeps as f32,
            ..params.clone()
        };
        if let Err(err) = self.solver.set_params(step_params) {
            self.last_error = Some(err.clone());
            return Err(err);
        }
        self.last_error = None;

        for _ in 0..substeps {
            self.solver.step(&mut self.particles);
        }
        Ok(())
    }
}
