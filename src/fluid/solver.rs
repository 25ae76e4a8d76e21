//! PBF (Position Based Fluids) constraint solver.
//!
//! This module implements the density constraint projection of
//! "Position Based Fluids" by Macklin & Müller (2013).
//!
//! Each phase reads an immutable snapshot of the particle array, produces one
//! value per particle in parallel, and only then commits the values back into
//! the particles. A phase therefore never observes a partially written result
//! of itself, and the commit is the barrier between phases.

use bevy::prelude::*;
use rayon::prelude::*;

use super::kernels::KernelCoefficients;
use super::neighbors::NeighborLists;
use super::params::FluidParams;
use super::particle::Particle;

/// Constraint values below this are left alone (`lambda = 0`).
///
/// Over-density is always corrected, strong under-density is ignored so free
/// surfaces do not pull particles together. Empirically tuned and applied
/// regardless of scene scale.
pub const UNDER_DENSITY_CUTOFF: f32 = -0.1;

/// Gradient sums below this give `lambda = 0`.
pub const GRADIENT_EPSILON: f32 = 1e-6;

/// `W(delta_q)` below this disables the artificial pressure term.
pub const SCORR_EPSILON: f32 = 1e-9;

/// Position corrections are clamped to this fraction of `h` per iteration.
pub const MAX_CORRECTION_FRACTION: f32 = 0.1;

/// Density constraint solver for one step's neighbor snapshot.
pub struct ConstraintSolver<'a> {
    params: &'a FluidParams,
    kernels: KernelCoefficients,
    neighbors: &'a NeighborLists,
}

impl<'a> ConstraintSolver<'a> {
    pub fn new(params: &'a FluidParams, neighbors: &'a NeighborLists) -> Self {
        Self {
            params,
            kernels: KernelCoefficients::new(params.smoothing_radius),
            neighbors,
        }
    }

    /// Compute and commit densities.
    pub fn update_densities(&self, particles: &mut [Particle]) {
        let densities = self.compute_densities(particles);
        for (p, density) in particles.iter_mut().zip(densities) {
            p.density = density;
        }
    }

    /// Compute and commit lambdas.
    pub fn update_lambdas(&self, particles: &mut [Particle]) {
        let lambdas = self.compute_lambdas(particles);
        for (p, lambda) in particles.iter_mut().zip(lambdas) {
            p.lambda = lambda;
        }
    }

    /// Compute and commit position corrections.
    pub fn update_corrections(&self, particles: &mut [Particle]) {
        let corrections = self.compute_corrections(particles);
        for (p, correction) in particles.iter_mut().zip(corrections) {
            p.correction = correction;
        }
    }

    /// Density of every particle at its predicted position.
    ///
    /// `rho_i = rho_0 * (W(0) + sum_j W(|x_i - x_j|))`
    pub fn compute_densities(&self, particles: &[Particle]) -> Vec<f32> {
        let rest_density = self.params.rest_density;
        let h = self.kernels.h;
        let self_density = self.kernels.w(0.0);
        let floor_weight = self.params.floor_density_weight;
        let floor_y = self.params.bounds_min.y;

        particles
            .par_iter()
            .enumerate()
            .map(|(i, p_i)| {
                let pos_i = p_i.predicted_position;
                let mut sum = self_density;

                for &j in self.neighbors.get(i) {
                    let r = (pos_i - particles[j].predicted_position).length();
                    sum += self.kernels.w(r);
                }

                if floor_weight > 0.0 {
                    let floor_dist = (pos_i.y - floor_y).max(0.0);
                    if floor_dist < h {
                        sum += floor_weight * self.kernels.w(floor_dist);
                    }
                }

                rest_density * sum
            })
            .collect()
    }

    /// Lagrange multipliers from the committed densities.
    pub fn compute_lambdas(&self, particles: &[Particle]) -> Vec<f32> {
        let rest_density = self.params.rest_density;
        let epsilon = self.params.relaxation_epsilon;

        particles
            .par_iter()
            .enumerate()
            .map(|(i, p_i)| {
                let constraint = p_i.density / rest_density - 1.0;
                if constraint < UNDER_DENSITY_CUTOFF {
                    return 0.0;
                }

                let pos_i = p_i.predicted_position;
                let mut sum_grad_sq = 0.0;
                let mut grad_i = Vec3::ZERO;

                for &j in self.neighbors.get(i) {
                    let r = pos_i - particles[j].predicted_position;
                    let grad_j = self.kernels.grad_w(r) / rest_density;
                    sum_grad_sq += grad_j.length_squared();
                    grad_i += grad_j;
                }
                sum_grad_sq += grad_i.length_squared();

                if sum_grad_sq < GRADIENT_EPSILON {
                    return 0.0;
                }
                -constraint / (sum_grad_sq + epsilon)
            })
            .collect()
    }

    /// Position corrections from the committed lambdas, clamped to
    /// [`FluidParams::max_correction`].
    pub fn compute_corrections(&self, particles: &[Particle]) -> Vec<Vec3> {
        let rest_density = self.params.rest_density;
        let max_correction = self.params.max_correction();
        let pressure = self.params.artificial_pressure;
        let w_delta_q = self.kernels.w(pressure.delta_q);

        particles
            .par_iter()
            .enumerate()
            .map(|(i, p_i)| {
                let pos_i = p_i.predicted_position;
                let lambda_i = p_i.lambda;
                let mut delta = Vec3::ZERO;

                for &j in self.neighbors.get(i) {
                    let p_j = &particles[j];
                    let r = pos_i - p_j.predicted_position;

                    // Artificial pressure (tensile instability correction)
                    let s_corr = if w_delta_q > SCORR_EPSILON {
                        -pressure.k * (self.kernels.w(r.length()) / w_delta_q).powi(pressure.n)
                    } else {
                        0.0
                    };

                    delta += (lambda_i + p_j.lambda + s_corr) * self.kernels.grad_w(r);
                }

                (delta / rest_density).clamp_length_max(max_correction)
            })
            .collect()
    }

    /// Move predicted positions by the committed corrections.
    pub fn apply_corrections(particles: &mut [Particle]) {
        particles.par_iter_mut().for_each(|p| {
            p.predicted_position += p.correction;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::boundary::BoundaryEnforcer;
    use crate::fluid::kernels::SphKernels;
    use crate::fluid::spatial::SpatialHashGrid;

    fn params() -> FluidParams {
        FluidParams::default()
            .with_smoothing_radius(0.2)
            .with_particle_radius(0.05)
            .with_rest_density(1000.0)
            .with_bounds(Vec3::splat(-10.0), Vec3::splat(10.0))
    }

    fn neighbors_for(particles: &[Particle], params: &FluidParams) -> NeighborLists {
        let positions: Vec<Vec3> = particles.iter().map(|p| p.predicted_position).collect();
        let mut grid = SpatialHashGrid::new();
        grid.build(&positions, params.cell_size());
        let mut lists = NeighborLists::default();
        lists.build(&grid, &positions, params.smoothing_radius, 0);
        lists
    }

    #[test]
    fn test_isolated_particle_density_is_self_term() {
        let params = params();
        let particles = vec![Particle::new(Vec3::ZERO)];
        let lists = neighbors_for(&particles, &params);
        let solver = ConstraintSolver::new(&params, &lists);

        let densities = solver.compute_densities(&particles);
        let expected = params.rest_density * SphKernels::poly6(0.0, params.smoothing_radius);
        assert!((densities[0] - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn test_isolated_particle_has_zero_lambda() {
        let params = params();
        let mut particles = vec![Particle::new(Vec3::ZERO)];
        particles[0].density = 10.0 * params.rest_density;
        let lists = neighbors_for(&particles, &params);
        let solver = ConstraintSolver::new(&params, &lists);

        assert_eq!(solver.compute_lambdas(&particles), vec![0.0]);
    }

    #[test]
    fn test_under_density_is_ignored() {
        let params = params();
        let mut particles = vec![
            Particle::new(Vec3::ZERO),
            Particle::new(Vec3::new(0.1, 0.0, 0.0)),
        ];
        for p in &mut particles {
            p.density = 0.5 * params.rest_density;
        }
        let lists = neighbors_for(&particles, &params);
        let solver = ConstraintSolver::new(&params, &lists);

        assert_eq!(solver.compute_lambdas(&particles), vec![0.0, 0.0]);
    }

    #[test]
    fn test_compressed_pair_is_pushed_apart() {
        let params = params();
        let mut particles = vec![
            Particle::new(Vec3::ZERO),
            Particle::new(Vec3::new(0.05, 0.0, 0.0)),
        ];
        let lists = neighbors_for(&particles, &params);
        let solver = ConstraintSolver::new(&params, &lists);
        let boundary = BoundaryEnforcer::new(&params);

        solver.update_densities(&mut particles);
        solver.update_lambdas(&mut particles);
        solver.update_corrections(&mut particles);
        ConstraintSolver::apply_corrections(&mut particles);
        boundary.enforce_predicted(&mut particles);

        assert!(particles[0].lambda < 0.0);
        assert!(particles[0].correction.x < 0.0);
        assert!(particles[1].correction.x > 0.0);
        assert!(particles[1].predicted_position.x - particles[0].predicted_position.x > 0.05);
    }

    #[test]
    fn test_corrections_are_clamped() {
        let params = params();
        let mut particles = vec![
            Particle::new(Vec3::ZERO),
            Particle::new(Vec3::new(0.01, 0.0, 0.0)),
            Particle::new(Vec3::new(0.0, 0.01, 0.0)),
        ];
        for p in &mut particles {
            p.lambda = -1.0e6;
        }
        let lists = neighbors_for(&particles, &params);
        let solver = ConstraintSolver::new(&params, &lists);

        for correction in solver.compute_corrections(&particles) {
            assert!(correction.length() <= params.max_correction() * 1.0001);
        }
    }

    #[test]
    fn test_artificial_pressure_separates_close_pair() {
        let mut params = params();
        let particles = vec![
            Particle::new(Vec3::ZERO),
            Particle::new(Vec3::new(0.05, 0.0, 0.0)),
        ];
        let lists = neighbors_for(&particles, &params);
        assert!(particles.iter().all(|p| p.lambda == 0.0));

        let with_pressure = ConstraintSolver::new(&params, &lists).compute_corrections(&particles);
        params.artificial_pressure.k = 0.0;
        let without_pressure = ConstraintSolver::new(&params, &lists).compute_corrections(&particles);

        assert_eq!(without_pressure, vec![Vec3::ZERO, Vec3::ZERO]);
        assert!(with_pressure[0].x < 0.0);
        assert!(with_pressure[1].x > 0.0);
        assert!(with_pressure[0].y.abs() < 1e-6 && with_pressure[0].z.abs() < 1e-6);
    }

    #[test]
    fn test_floor_pseudo_density_is_opt_in() {
        let mut params = params();
        let particles = vec![Particle::new(Vec3::new(0.0, -9.95, 0.0))];
        let lists = neighbors_for(&particles, &params);

        let base = ConstraintSolver::new(&params, &lists).compute_densities(&particles)[0];
        params.floor_density_weight = 0.5;
        let boosted = ConstraintSolver::new(&params, &lists).compute_densities(&particles)[0];

        assert!(boosted > base);
    }
}
