//! Fluid simulation parameters.
//!
//! These parameters control the behavior of the solver. They are treated as
//! immutable for the duration of a step, but a host may change them between
//! steps (see [`super::drivers`]).

use bevy::prelude::*;

use super::error::ConfigError;

/// Most grid cells a neighbor query may span per axis on each side, which
/// bounds an explicit cell size from below at `h / MAX_CELLS_PER_RADIUS`.
pub const MAX_CELLS_PER_RADIUS: f32 = 8.0;

/// Tensile-instability correction (`s_corr`) tuning.
///
/// `s_corr = -k * (W(r) / W(delta_q))^n`, where `delta_q` is an absolute
/// distance inside the kernel support.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct ArtificialPressure {
    /// Strength of the anti-clustering term.
    pub k: f32,
    /// Reference distance for the kernel ratio.
    pub delta_q: f32,
    /// Exponent of the kernel ratio.
    pub n: i32,
}

impl Default for ArtificialPressure {
    fn default() -> Self {
        Self {
            k: 0.1,
            delta_q: 0.1,
            n: 4,
        }
    }
}

/// Parameters controlling the fluid simulation behavior.
#[derive(Resource, Clone, Debug, Reflect)]
#[reflect(Resource)]
pub struct FluidParams {
    /// Timestep of a single solver step, in seconds.
    pub dt: f32,

    /// Gravity acceleration vector.
    pub gravity: Vec3,

    /// Rest density of the fluid.
    pub rest_density: f32,

    /// Smoothing kernel radius (h).
    pub smoothing_radius: f32,

    /// Particle radius, used as the boundary clearance.
    pub particle_radius: f32,

    /// Simulation domain bounds (min corner).
    pub bounds_min: Vec3,

    /// Simulation domain bounds (max corner).
    pub bounds_max: Vec3,

    /// Number of constraint solver iterations per step. Fixed budget, no early exit.
    pub solver_iterations: u32,

    /// Relaxation added to the lambda denominator.
    pub relaxation_epsilon: f32,

    /// Artificial pressure tuning.
    pub artificial_pressure: ArtificialPressure,

    /// Fraction of the normal velocity kept (and reversed) on a wall hit.
    pub boundary_damping: f32,

    /// Vorticity confinement strength. Zero disables the pass.
    pub vorticity_strength: f32,

    /// XSPH viscosity coefficient. Zero disables the pass.
    pub xsph_c: f32,

    /// Grid cell size. `None` uses the smoothing radius.
    pub cell_size: Option<f32>,

    /// Maximum neighbors kept per particle (0 = unlimited).
    pub max_neighbors: u32,

    /// Weight of the floor pseudo-density term (0 = disabled).
    ///
    /// Experimental: particles within `h` of the floor receive
    /// `weight * W(distance_to_floor)` of extra density.
    pub floor_density_weight: f32,

    /// Number of solver steps a host frame is split into.
    pub substeps: u32,

    /// Frame timestep used by the plugin. `None` uses the frame delta time.
    pub fixed_timestep: Option<f32>,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            dt: 0.016,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            rest_density: 150.0,
            smoothing_radius: 0.5,
            particle_radius: 0.2,
            bounds_min: Vec3::new(-8.0, 0.0, -10.0),
            bounds_max: Vec3::new(8.0, 100.0, 10.0),
            solver_iterations: 3,
            relaxation_epsilon: 0.01,
            artificial_pressure: ArtificialPressure::default(),
            boundary_damping: 0.3,
            vorticity_strength: 0.008,
            xsph_c: 0.01,
            cell_size: None,
            max_neighbors: 0,
            floor_density_weight: 0.0,
            substeps: 1,
            fixed_timestep: None,
        }
    }
}

impl FluidParams {
    /// Creates parameters for real-time water.
    pub fn water() -> Self {
        Self::default()
    }

    /// Creates parameters for honey-like viscous fluid.
    pub fn honey() -> Self {
        Self {
            xsph_c: 0.3,
            vorticity_strength: 0.0,
            ..Self::default()
        }
    }

    /// Creates parameters for fast, splashy water.
    pub fn splashy() -> Self {
        Self {
            xsph_c: 0.001,
            vorticity_strength: 0.02,
            solver_iterations: 2,
            substeps: 2,
            ..Self::default()
        }
    }

    /// Set the timestep.
    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    /// Set gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the smoothing radius. The artificial pressure reference distance
    /// keeps its ratio to `h`.
    pub fn with_smoothing_radius(mut self, h: f32) -> Self {
        if self.smoothing_radius > 0.0 {
            let ratio = self.artificial_pressure.delta_q / self.smoothing_radius;
            self.artificial_pressure.delta_q = ratio * h;
        }
        self.smoothing_radius = h;
        self
    }

    /// Set the particle radius.
    pub fn with_particle_radius(mut self, radius: f32) -> Self {
        self.particle_radius = radius;
        self
    }

    /// Set the rest density.
    pub fn with_rest_density(mut self, rest_density: f32) -> Self {
        self.rest_density = rest_density;
        self
    }

    /// Set the domain bounds.
    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.bounds_min = min;
        self.bounds_max = max;
        self
    }

    /// Set the number of solver iterations.
    pub fn with_solver_iterations(mut self, iterations: u32) -> Self {
        self.solver_iterations = iterations;
        self
    }

    /// Set the number of substeps per host frame.
    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps;
        self
    }

    /// Set the vorticity confinement strength.
    pub fn with_vorticity(mut self, strength: f32) -> Self {
        self.vorticity_strength = strength;
        self
    }

    /// Set the XSPH viscosity coefficient.
    pub fn with_xsph(mut self, c: f32) -> Self {
        self.xsph_c = c;
        self
    }

    /// Set the boundary damping.
    pub fn with_boundary_damping(mut self, damping: f32) -> Self {
        self.boundary_damping = damping;
        self
    }

    /// Set an explicit grid cell size.
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    /// Grid cell size used for neighbor search.
    pub fn cell_size(&self) -> f32 {
        self.cell_size.unwrap_or(self.smoothing_radius)
    }

    /// Largest position correction allowed per iteration.
    pub fn max_correction(&self) -> f32 {
        super::solver::MAX_CORRECTION_FRACTION * self.smoothing_radius
    }

    /// Checks every parameter the solver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written as negations so NaN is rejected too.
        if !(self.smoothing_radius > 0.0) {
            return Err(ConfigError::NonPositiveSmoothingRadius(self.smoothing_radius));
        }
        if !(self.rest_density > 0.0) {
            return Err(ConfigError::NonPositiveRestDensity(self.rest_density));
        }
        if self.solver_iterations < 1 {
            return Err(ConfigError::ZeroSolverIterations);
        }
        if !(self.dt > 0.0) {
            return Err(ConfigError::NonPositiveTimestep(self.dt));
        }
        if !(self.particle_radius >= 0.0) {
            return Err(ConfigError::NegativeParticleRadius(self.particle_radius));
        }
        let clearance = Vec3::splat(2.0 * self.particle_radius);
        if !(self.bounds_max - self.bounds_min).cmpge(clearance).all() {
            return Err(ConfigError::InvalidBounds {
                min: self.bounds_min.to_array(),
                max: self.bounds_max.to_array(),
                radius: self.particle_radius,
            });
        }
        if !(0.0..=1.0).contains(&self.boundary_damping) {
            return Err(ConfigError::DampingOutOfRange(self.boundary_damping));
        }
        if let Some(cell_size) = self.cell_size {
            if !(cell_size > 0.0) {
                return Err(ConfigError::NonPositiveCellSize(cell_size));
            }
            let min = self.smoothing_radius / MAX_CELLS_PER_RADIUS;
            if cell_size < min {
                return Err(ConfigError::CellSizeTooSmall {
                    cell_size,
                    min,
                    smoothing_radius: self.smoothing_radius,
                });
            }
        }
        Ok(())
    }
}
