//! Velocity update and stabilization passes, run once per step after the
//! constraint iterations.

use bevy::prelude::*;
use rayon::prelude::*;

use super::kernels::{KernelCoefficients, KERNEL_EPSILON};
use super::neighbors::NeighborLists;
use super::params::FluidParams;
use super::particle::Particle;

/// Uniform velocity damping applied when velocities are derived from positions.
pub const VELOCITY_DAMPING: f32 = 0.98;

/// Vertical speeds below this are considered settling.
pub const SETTLE_SPEED: f32 = 0.05;

/// Extra damping for settling vertical components.
pub const SETTLE_DAMPING: f32 = 0.5;

/// Largest velocity change vorticity confinement may add in one step.
pub const MAX_VORTICITY_IMPULSE: f32 = 1.0;

/// Derive velocities from the position change and commit predicted positions.
pub fn update_velocities(particles: &mut [Particle], dt: f32) {
    let inv_dt = 1.0 / dt;

    particles.par_iter_mut().for_each(|p| {
        let mut velocity = (p.predicted_position - p.position) * inv_dt * VELOCITY_DAMPING;
        if velocity.y.abs() < SETTLE_SPEED {
            velocity.y *= SETTLE_DAMPING;
        }
        p.velocity = velocity;
        p.position = p.predicted_position;
    });
}

/// Velocity passes that read neighbor data.
pub struct PostProcess<'a> {
    params: &'a FluidParams,
    kernels: KernelCoefficients,
    neighbors: &'a NeighborLists,
}

impl<'a> PostProcess<'a> {
    pub fn new(params: &'a FluidParams, neighbors: &'a NeighborLists) -> Self {
        Self {
            params,
            kernels: KernelCoefficients::new(params.smoothing_radius),
            neighbors,
        }
    }

    /// Vorticity `ω_i = Σ_j (v_j - v_i) × ∇W(x_i - x_j)` of every particle.
    pub fn compute_vorticity(&self, particles: &[Particle]) -> Vec<Vec3> {
        particles
            .par_iter()
            .enumerate()
            .map(|(i, p_i)| {
                self.neighbors
                    .get(i)
                    .iter()
                    .map(|&j| {
                        let p_j = &particles[j];
                        (p_j.velocity - p_i.velocity).cross(self.kernels.grad_w(p_i.position - p_j.position))
                    })
                    .sum::<Vec3>()
            })
            .collect()
    }

    /// Add vorticity confinement. Skipped when the strength is not positive.
    pub fn apply_vorticity_confinement(&self, particles: &mut [Particle]) {
        let strength = self.params.vorticity_strength;
        if strength <= 0.0 {
            return;
        }
        let dt = self.params.dt;

        let vorticity = self.compute_vorticity(particles);

        let impulses: Vec<Vec3> = particles
            .par_iter()
            .enumerate()
            .map(|(i, p_i)| {
                // Gradient of the vorticity magnitude field
                let mut eta = Vec3::ZERO;
                for &j in self.neighbors.get(i) {
                    eta += vorticity[j].length() * self.kernels.grad_w(p_i.position - particles[j].position);
                }

                let eta_len = eta.length();
                if eta_len < KERNEL_EPSILON {
                    return Vec3::ZERO;
                }
                let force = strength * (eta / eta_len).cross(vorticity[i]);
                (force * dt).clamp_length_max(MAX_VORTICITY_IMPULSE)
            })
            .collect();

        for (p, impulse) in particles.iter_mut().zip(impulses) {
            p.velocity += impulse;
        }
    }

    /// XSPH velocity smoothing. Skipped when the coefficient is not positive.
    pub fn apply_xsph_viscosity(&self, particles: &mut [Particle]) {
        let c = self.params.xsph_c;
        if c <= 0.0 {
            return;
        }

        let corrections: Vec<Vec3> = particles
            .par_iter()
            .enumerate()
            .map(|(i, p_i)| {
                let mut correction = Vec3::ZERO;
                for &j in self.neighbors.get(i) {
                    let p_j = &particles[j];
                    let w = self.kernels.w((p_i.position - p_j.position).length());
                    correction += (p_j.velocity - p_i.velocity) * w;
                }
                c * correction
            })
            .collect();

        for (p, correction) in particles.iter_mut().zip(corrections) {
            p.velocity += correction;
        }
    }
}
