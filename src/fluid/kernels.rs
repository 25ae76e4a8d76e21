//! SPH kernel functions for PBF.
//!
//! Poly6 is used for density estimation and the viscosity filter, the Spiky
//! gradient for constraint gradients, corrections and vorticity.

use std::f32::consts::PI;

use bevy::prelude::*;

/// Below this length a separation vector has no usable direction.
pub const KERNEL_EPSILON: f32 = 1e-6;

/// SPH kernel functions.
pub struct SphKernels;

impl SphKernels {
    /// Poly6 kernel for density estimation.
    /// W(r, h) = (315 / 64πh⁹) * (h² - r²)³ for r ≤ h
    #[inline]
    pub fn poly6(r: f32, h: f32) -> f32 {
        Self::poly6_with_coeff(r, h, KernelCoefficients::poly6(h))
    }

    /// Poly6 kernel with precomputed coefficient.
    #[inline]
    pub fn poly6_with_coeff(r: f32, h: f32, coeff: f32) -> f32 {
        if r > h {
            return 0.0;
        }
        let diff = h * h - r * r;
        coeff * diff * diff * diff
    }

    /// Gradient of Spiky kernel.
    /// ∇W(r, h) = -(45 / πh⁶) * (h - |r|)² * r / (|r| + ε) for ε ≤ |r| ≤ h
    #[inline]
    pub fn spiky_gradient(r: Vec3, h: f32) -> Vec3 {
        Self::spiky_gradient_with_coeff(r, h, KernelCoefficients::spiky_gradient(h))
    }

    /// Spiky gradient with precomputed coefficient.
    #[inline]
    pub fn spiky_gradient_with_coeff(r: Vec3, h: f32, coeff: f32) -> Vec3 {
        let r_len = r.length();
        if r_len > h || r_len < KERNEL_EPSILON {
            return Vec3::ZERO;
        }
        let diff = h - r_len;
        r * (coeff * diff * diff / (r_len + KERNEL_EPSILON))
    }
}

/// Kernel coefficients for a fixed smoothing radius, computed once per step.
#[derive(Clone, Copy, Debug)]
pub struct KernelCoefficients {
    /// Smoothing radius the coefficients were computed for.
    pub h: f32,
    /// 315 / (64πh⁹)
    pub poly6: f32,
    /// -45 / (πh⁶)
    pub spiky_gradient: f32,
}

impl KernelCoefficients {
    pub fn new(h: f32) -> Self {
        Self {
            h,
            poly6: Self::poly6(h),
            spiky_gradient: Self::spiky_gradient(h),
        }
    }

    #[inline]
    fn poly6(h: f32) -> f32 {
        315.0 / (64.0 * PI * h.powi(9))
    }

    #[inline]
    fn spiky_gradient(h: f32) -> f32 {
        -45.0 / (PI * h.powi(6))
    }

    /// Poly6 at distance `r`.
    #[inline]
    pub fn w(&self, r: f32) -> f32 {
        SphKernels::poly6_with_coeff(r, self.h, self.poly6)
    }

    /// Spiky gradient for separation `r`.
    #[inline]
    pub fn grad_w(&self, r: Vec3) -> Vec3 {
        SphKernels::spiky_gradient_with_coeff(r, self.h, self.spiky_gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly6_kernel() {
        let h = 1.0;

        // At r=0, kernel should be maximum
        let w_0 = SphKernels::poly6(0.0, h);
        assert!(w_0 > 0.0);

        // At r=h, kernel should be 0
        let w_h = SphKernels::poly6(h, h);
        assert!(w_h.abs() < 1e-6);

        // Kernel should decrease with distance
        let w_half = SphKernels::poly6(0.5 * h, h);
        assert!(w_half < w_0);
        assert!(w_half > w_h);
    }

    #[test]
    fn test_poly6_strictly_decreasing_inside_support() {
        let h = 0.2;
        let samples: Vec<f32> = (0..50)
            .map(|i| SphKernels::poly6(h * i as f32 / 50.0, h))
            .collect();
        for pair in samples.windows(2) {
            assert!(pair[1] < pair[0]);
        }
        assert!(samples.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_kernels_vanish_outside_support() {
        for &h in &[0.1_f32, 0.5, 2.0] {
            for &scale in &[1.0001_f32, 1.5, 10.0] {
                let r = h * scale;
                assert_eq!(SphKernels::poly6(r, h), 0.0);
                let dir = Vec3::new(1.0, -2.0, 0.5).normalize();
                assert_eq!(SphKernels::spiky_gradient(dir * r, h), Vec3::ZERO);
            }
        }
    }

    #[test]
    fn test_spiky_gradient() {
        let h = 1.0;

        // At r=0, gradient should be zero (undefined direction)
        let grad_0 = SphKernels::spiky_gradient(Vec3::ZERO, h);
        assert!(grad_0.length() < 1e-6);

        // Gradient points back toward the neighbor
        let r = Vec3::new(0.5, 0.0, 0.0);
        let grad = SphKernels::spiky_gradient(r, h);
        assert!(grad.x < 0.0);

        let expected = 45.0 / (PI * h.powi(6)) * 0.25;
        assert!((grad.length() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_coefficients_match_free_functions() {
        let coeffs = KernelCoefficients::new(0.3);
        let r = Vec3::new(0.1, 0.05, -0.02);
        assert_eq!(coeffs.w(r.length()), SphKernels::poly6(r.length(), 0.3));
        assert_eq!(coeffs.grad_w(r), SphKernels::spiky_gradient(r, 0.3));
    }
}
