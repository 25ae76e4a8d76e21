//! Per-frame parameter drivers.
//!
//! Drivers never touch the [`FluidParams`] resource itself. They adjust the
//! copy handed to the solver for one frame, so switching a driver off
//! restores the configured values on the next frame.

use std::f32::consts::TAU;

use bevy::prelude::*;

use super::params::FluidParams;

/// Ramps gravity up linearly over the first `frames` frames.
#[derive(Resource, Clone, Debug, Default)]
pub struct GravityWarmup {
    /// Length of the ramp. Zero disables the ramp.
    pub frames: u32,
    elapsed: u32,
}

impl GravityWarmup {
    pub fn new(frames: u32) -> Self {
        Self { frames, elapsed: 0 }
    }

    /// Current gravity scale in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.frames == 0 {
            return 1.0;
        }
        (self.elapsed as f32 / self.frames as f32).min(1.0)
    }

    /// Frames simulated since the ramp started.
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Restart the ramp.
    pub fn reset(&mut self) {
        self.elapsed = 0;
    }

    /// Scale the frame's gravity.
    pub fn apply(&self, params: &mut FluidParams) {
        params.gravity *= self.progress();
    }

    /// Count one simulated frame.
    pub fn advance(&mut self) {
        self.elapsed = self.elapsed.saturating_add(1);
    }
}

/// Oscillating wall: pushes the `-z` face of the domain inward.
///
/// The displacement is `max(0, amplitude * sin(2π * frequency * t))`, so the
/// wall never retreats past its configured position.
#[derive(Resource, Clone, Debug)]
pub struct WaveWall {
    pub amplitude: f32,
    /// Oscillations per second.
    pub frequency: f32,
    pub active: bool,
    time: f32,
}

impl Default for WaveWall {
    fn default() -> Self {
        Self {
            amplitude: 4.0,
            frequency: 0.6,
            active: false,
            time: 0.0,
        }
    }
}

impl WaveWall {
    pub fn new(amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            frequency,
            ..default()
        }
    }

    /// Start the wave from phase zero.
    pub fn enable(&mut self) {
        self.active = true;
        self.time = 0.0;
    }

    pub fn disable(&mut self) {
        self.active = false;
    }

    /// Wall displacement at the current time.
    pub fn displacement(&self) -> f32 {
        (self.amplitude * (TAU * self.frequency * self.time).sin()).max(0.0)
    }

    /// Advance the wave clock by `dt` and displace the frame's `bounds_min.z`.
    /// Does nothing while inactive.
    pub fn apply(&mut self, params: &mut FluidParams, dt: f32) {
        if !self.active {
            return;
        }
        self.time += dt;
        params.bounds_min.z += self.displacement();
    }
}
