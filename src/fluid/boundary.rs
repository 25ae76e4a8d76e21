//! Boundary handling for the fluid domain.
//!
//! The domain is an axis-aligned box. Particles are kept one particle radius
//! away from each face. Predicted positions are only clamped; final positions
//! are clamped and the offending velocity component is reflected and damped.

use bevy::math::BVec3;
use bevy::prelude::*;
use rayon::prelude::*;

use super::params::FluidParams;
use super::particle::Particle;

/// Box-shaped boundary (AABB) with damped reflection.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryEnforcer {
    /// Lowest allowed particle center.
    pub min: Vec3,
    /// Highest allowed particle center.
    pub max: Vec3,
    /// Fraction of the normal velocity kept after a reflection.
    pub damping: f32,
}

impl BoundaryEnforcer {
    /// Build the enforcer for the bounds, radius and damping in `params`.
    pub fn new(params: &FluidParams) -> Self {
        let radius = Vec3::splat(params.particle_radius);
        Self {
            min: params.bounds_min + radius,
            max: params.bounds_max - radius,
            damping: params.boundary_damping,
        }
    }

    /// Check if a point is inside the allowed region.
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Clamp a position into the box. Returns a mask of the axes that were clamped.
    #[inline]
    pub fn clamp_position(&self, position: &mut Vec3) -> BVec3 {
        let clamped = position.cmplt(self.min) | position.cmpgt(self.max);
        *position = position.clamp(self.min, self.max);
        clamped
    }

    /// Apply a wall hit to a final position: clamp, then reflect and damp the
    /// velocity on every clamped axis.
    #[inline]
    pub fn apply_collision(&self, position: &mut Vec3, velocity: &mut Vec3) {
        let clamped = self.clamp_position(position);
        let reflected = *velocity * -self.damping;
        *velocity = Vec3::select(clamped, reflected, *velocity);
    }

    /// Clamp predicted positions. Velocities are not touched.
    pub fn enforce_predicted(&self, particles: &mut [Particle]) {
        particles.par_iter_mut().for_each(|p| {
            self.clamp_position(&mut p.predicted_position);
        });
    }

    /// Clamp final positions and reflect velocities.
    pub fn enforce_final(&self, particles: &mut [Particle]) {
        particles.par_iter_mut().for_each(|p| {
            self.apply_collision(&mut p.position, &mut p.velocity);
        });
    }
}
