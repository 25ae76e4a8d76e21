//! Bevy plugin for fluid simulation.

use bevy::log::{error, info};
use bevy::prelude::*;

use super::drivers::{GravityWarmup, WaveWall};
use super::params::FluidParams;
use super::simulation::{FluidSimulation, ParticleStagingBuffer};

/// Longest frame the simulation will integrate in one update.
pub const MAX_FRAME_DT: f32 = 1.0 / 30.0;

/// Parameters the solver uses this frame: [`FluidParams`] after the
/// parameter drivers ran.
#[derive(Resource, Clone, Debug, Default)]
pub struct FrameParams(pub FluidParams);

/// Plugin that adds Position Based Fluids simulation to a Bevy app.
///
/// # Example
///
/// ```rust,ignore
/// use bevy::prelude::*;
/// use stillwater::prelude::*;
///
/// fn main() {
///     App::new()
///         .add_plugins(MinimalPlugins)
///         .add_plugins(FluidPlugin::with_params(FluidParams::water()))
///         .run();
/// }
/// ```
#[derive(Default)]
pub struct FluidPlugin {
    pub params: FluidParams,
}

impl FluidPlugin {
    pub fn with_params(params: FluidParams) -> Self {
        Self { params }
    }
}

impl Plugin for FluidPlugin {
    fn build(&self, app: &mut App) {
        // Register types for reflection
        app.register_type::<FluidParams>();

        // Initialize resources
        app.insert_resource(self.params.clone())
            .init_resource::<FrameParams>()
            .init_resource::<ParticleStagingBuffer>()
            .init_resource::<FluidSimulation>();

        // Add simulation systems
        app.add_systems(
            Update,
            (upload_staged_particles, drive_parameters, run_simulation).chain(),
        );
    }
}

/// Frame length to integrate: the fixed timestep if configured, otherwise
/// the host frame time, clamped to [`MAX_FRAME_DT`].
fn frame_dt(params: &FluidParams, time: &Time) -> f32 {
    params
        .fixed_timestep
        .unwrap_or(time.delta_secs())
        .min(MAX_FRAME_DT)
}

/// System to upload staged particles to the simulation.
fn upload_staged_particles(
    mut staging: ResMut<ParticleStagingBuffer>,
    mut simulation: ResMut<FluidSimulation>,
) {
    if staging.is_empty() {
        return;
    }
    let added = simulation.upload_from_staging(&mut staging);
    info!(
        "uploaded {} particles ({} total)",
        added,
        simulation.num_particles()
    );
}

/// System to derive this frame's solver parameters.
fn drive_parameters(
    time: Res<Time>,
    params: Res<FluidParams>,
    warmup: Option<Res<GravityWarmup>>,
    wave: Option<ResMut<WaveWall>>,
    mut frame: ResMut<FrameParams>,
) {
    let mut driven = params.clone();
    if let Some(warmup) = warmup {
        warmup.apply(&mut driven);
    }
    if let Some(mut wave) = wave {
        wave.apply(&mut driven, frame_dt(&params, &time));
    }
    frame.0 = driven;
}

/// System to run the fluid simulation. The gravity ramp only advances on
/// frames that were actually simulated.
fn run_simulation(
    time: Res<Time>,
    frame: Res<FrameParams>,
    warmup: Option<ResMut<GravityWarmup>>,
    mut simulation: ResMut<FluidSimulation>,
) {
    let dt = frame_dt(&frame.0, &time);
    if dt <= 0.0 {
        return;
    }

    let was_paused = simulation.last_error().is_some();
    match simulation.advance(&frame.0, dt) {
        Ok(()) => {
            if was_paused {
                info!("fluid parameters valid again, resuming");
            }
            if let Some(mut warmup) = warmup {
                warmup.advance();
            }
        }
        Err(err) => {
            if !was_paused {
                error!("invalid fluid parameters, simulation paused: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::error::ConfigError;
    use crate::fluid::particle::Particle;

    fn test_app(params: FluidParams) -> App {
        let mut app = App::new();
        app.init_resource::<Time>()
            .add_plugins(FluidPlugin::with_params(params));
        app
    }

    fn fixed_params() -> FluidParams {
        let mut params = FluidParams::default();
        params.fixed_timestep = Some(0.01);
        params
    }

    #[test]
    fn test_staged_particles_are_simulated() {
        let mut app = test_app(fixed_params());
        app.world_mut()
            .resource_mut::<ParticleStagingBuffer>()
            .add_particle(Particle::new(Vec3::new(0.0, 5.0, 0.0)));

        app.update();

        let simulation = app.world().resource::<FluidSimulation>();
        assert_eq!(simulation.num_particles(), 1);
        assert!(simulation.particles[0].position.y < 5.0);
        assert!(app.world().resource::<ParticleStagingBuffer>().is_empty());
    }

    #[test]
    fn test_zero_frame_time_skips_step() {
        let mut app = test_app(FluidParams::default());
        app.world_mut()
            .resource_mut::<ParticleStagingBuffer>()
            .add_particle(Particle::new(Vec3::new(0.0, 5.0, 0.0)));

        app.update();

        let simulation = app.world().resource::<FluidSimulation>();
        assert_eq!(simulation.particles[0].position, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_invalid_params_pause_simulation() {
        let mut app = test_app(fixed_params().with_rest_density(-1.0));
        app.world_mut()
            .resource_mut::<ParticleStagingBuffer>()
            .add_particle(Particle::new(Vec3::new(0.0, 5.0, 0.0)));

        app.update();

        let simulation = app.world().resource::<FluidSimulation>();
        assert_eq!(simulation.particles[0].position, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(
            simulation.last_error(),
            Some(&ConfigError::NonPositiveRestDensity(-1.0))
        );

        // Fixing the resource resumes the simulation
        app.world_mut().resource_mut::<FluidParams>().rest_density = 150.0;
        app.update();
        let simulation = app.world().resource::<FluidSimulation>();
        assert!(simulation.last_error().is_none());
        assert!(simulation.particles[0].position.y < 5.0);
    }

    #[test]
    fn test_warmup_holds_first_frame() {
        let mut app = test_app(fixed_params());
        app.insert_resource(GravityWarmup::new(10));
        app.world_mut()
            .resource_mut::<ParticleStagingBuffer>()
            .add_particle(Particle::new(Vec3::new(0.0, 5.0, 0.0)));

        app.update();

        assert_eq!(app.world().resource::<FrameParams>().0.gravity, Vec3::ZERO);
        let simulation = app.world().resource::<FluidSimulation>();
        assert_eq!(simulation.particles[0].position.y, 5.0);
        assert_eq!(app.world().resource::<GravityWarmup>().elapsed(), 1);
    }

    #[test]
    fn test_warmup_waits_for_simulated_frames() {
        // No fixed timestep and no time plugin: every frame has zero length
        let mut app = test_app(FluidParams::default());
        app.insert_resource(GravityWarmup::new(10));
        app.update();
        app.update();
        assert_eq!(app.world().resource::<GravityWarmup>().elapsed(), 0);

        // Paused on invalid parameters
        let mut app = test_app(fixed_params().with_rest_density(-1.0));
        app.insert_resource(GravityWarmup::new(10));
        app.update();
        app.update();
        assert_eq!(app.world().resource::<GravityWarmup>().elapsed(), 0);

        app.world_mut().resource_mut::<FluidParams>().rest_density = 150.0;
        app.update();
        assert_eq!(app.world().resource::<GravityWarmup>().elapsed(), 1);
    }
}
