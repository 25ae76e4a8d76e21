//! Fluid particle data and block generation.

use bevy::prelude::*;

/// Default particle color (linear RGB water blue).
pub const WATER_COLOR: Vec3 = Vec3::new(0.2, 0.5, 0.9);

/// A single fluid particle.
///
/// `predicted_position`, `density`, `lambda` and `correction` are scratch
/// values owned by the solver. They are rewritten every step and carry no
/// meaning between steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub predicted_position: Vec3,
    pub velocity: Vec3,
    pub density: f32,
    /// Lagrange multiplier of the density constraint.
    pub lambda: f32,
    /// Position correction from the last solver iteration.
    pub correction: Vec3,
    /// Render metadata; the solver never reads it.
    pub color: Vec3,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            predicted_position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            density: 0.0,
            lambda: 0.0,
            correction: Vec3::ZERO,
            color: WATER_COLOR,
        }
    }
}

impl Particle {
    /// Create a particle at rest at a given position.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            predicted_position: position,
            ..default()
        }
    }

    /// Set the initial velocity.
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the color.
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }
}

/// Axis-aligned block of particles on a regular lattice.
#[derive(Clone, Debug)]
pub struct ParticleBlock {
    /// Minimum corner of the block.
    pub origin: Vec3,
    /// Number of particles along each axis.
    pub counts: UVec3,
    /// Distance between neighboring lattice points.
    pub spacing: f32,
    /// Initial velocity of every particle.
    pub initial_velocity: Vec3,
    /// Colors at the bottom and top of the block, blended by height.
    pub gradient: (Vec3, Vec3),
}

impl ParticleBlock {
    /// Create a block of `counts` particles starting at `origin`.
    pub fn new(origin: Vec3, counts: UVec3, spacing: f32) -> Self {
        Self {
            origin,
            counts,
            spacing,
            initial_velocity: Vec3::ZERO,
            gradient: (WATER_COLOR, WATER_COLOR),
        }
    }

    /// Create the largest block with the given spacing that fits in `min..max`.
    pub fn filling(min: Vec3, max: Vec3, spacing: f32) -> Self {
        let counts = ((max - min) / spacing).floor().max(Vec3::ZERO).as_uvec3() + UVec3::ONE;
        Self::new(min, counts, spacing)
    }

    /// Set initial velocity.
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.initial_velocity = velocity;
        self
    }

    /// Blend colors from `bottom` to `top`.
    pub fn with_gradient(mut self, bottom: Vec3, top: Vec3) -> Self {
        self.gradient = (bottom, top);
        self
    }

    /// Total number of particles in the block.
    pub fn len(&self) -> usize {
        self.counts.x as usize * self.counts.y as usize * self.counts.z as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate the particles of this block.
    pub fn generate(&self) -> Vec<Particle> {
        let mut particles = Vec::with_capacity(self.len());
        let (bottom, top) = self.gradient;

        for x in 0..self.counts.x {
            for y in 0..self.counts.y {
                let height_ratio = y as f32 / self.counts.y as f32;
                let color = bottom.lerp(top, height_ratio);
                for z in 0..self.counts.z {
                    let offset = UVec3::new(x, y, z).as_vec3() * self.spacing;
                    particles.push(
                        Particle::new(self.origin + offset)
                            .with_velocity(self.initial_velocity)
                            .with_color(color),
                    );
                }
            }
        }

        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_positions() {
        let block = ParticleBlock::new(Vec3::ZERO, UVec3::new(3, 2, 4), 0.5);
        let particles = block.generate();

        assert_eq!(particles.len(), 24);
        assert_eq!(particles.len(), block.len());
        assert_eq!(particles[0].position, Vec3::ZERO);
        assert!(particles
            .iter()
            .all(|p| p.position.cmple(Vec3::new(1.0, 0.5, 1.5)).all()));
        assert!(particles
            .iter()
            .all(|p| p.position == p.predicted_position));
    }

    #[test]
    fn test_filling_block_stays_inside() {
        let min = Vec3::new(-1.0, 0.0, -1.0);
        let max = Vec3::new(1.0, 1.0, 1.0);
        let particles = ParticleBlock::filling(min, max, 0.25).generate();

        assert_eq!(particles.len(), 9 * 5 * 9);
        for p in &particles {
            assert!(p.position.cmpge(min).all());
            assert!(p.position.cmple(max + Vec3::splat(1e-5)).all());
        }
    }

    #[test]
    fn test_gradient_colors() {
        let bottom = Vec3::new(0.0, 0.0, 1.0);
        let top = Vec3::new(1.0, 0.0, 0.0);
        let particles = ParticleBlock::new(Vec3::ZERO, UVec3::new(1, 4, 1), 1.0)
            .with_gradient(bottom, top)
            .generate();

        assert_eq!(particles[0].color, bottom);
        assert!(particles[3].color.x > particles[1].color.x);
    }
}
