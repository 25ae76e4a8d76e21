//! Stillwater - headless Position Based Fluids run
//!
//! Collapses a block of water in the default tank, logs density statistics
//! every second of simulated time and optionally writes a per-frame CSV log.
//!
//! Usage: `stillwater [frames] [density_log.csv]`

use std::fs::File;
use std::io::{self, BufWriter};

use bevy::log::{info, LogPlugin};
use bevy::prelude::*;
use bevy::time::TimePlugin;
use stillwater::prelude::*;

const FRAME_DT: f32 = 1.0 / 60.0;

fn main() -> io::Result<()> {
    let mut args = std::env::args().skip(1);
    let frames: u32 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(600);
    let mut density_log = match args.next() {
        Some(path) => Some(DensityLog::new(BufWriter::new(File::create(path)?))?),
        None => None,
    };

    let params = FluidParams {
        fixed_timestep: Some(FRAME_DT),
        ..FluidParams::water()
    };
    let spacing = params.particle_radius * 2.1;
    let origin = params.bounds_min + Vec3::splat(params.particle_radius * 3.0);
    let block = ParticleBlock::filling(origin, origin + Vec3::new(4.0, 8.0, 4.0), spacing)
        .with_gradient(WATER_COLOR * 0.6, WATER_COLOR);

    let mut app = App::new();
    app.add_plugins((LogPlugin::default(), TimePlugin))
        .add_plugins(FluidPlugin::with_params(params.clone()))
        .insert_resource(GravityWarmup::new(30));
    app.world_mut()
        .resource_mut::<ParticleStagingBuffer>()
        .extend(block.generate());
    app.finish();
    app.cleanup();

    info!("dam break: {} particles, {} frames", block.len(), frames);

    for frame in 0..frames {
        app.update();

        let simulation = app.world().resource::<FluidSimulation>();
        let stats = compute_statistics(&simulation.particles);
        if let Some(log) = density_log.as_mut() {
            log.record(&stats, params.rest_density)?;
        }
        if frame % 60 == 0 {
            info!(
                "frame {frame}: density avg {:.2} max {:.2} (rest {}), speed avg {:.3} max {:.3}",
                stats.avg_density,
                stats.max_density,
                params.rest_density,
                stats.avg_speed,
                stats.max_speed
            );
        }
    }

    let simulation = app.world().resource::<FluidSimulation>();
    info!(
        "done: mean density error {:.4}",
        mean_density_error(&simulation.particles, &params)
    );
    if let Some(log) = density_log.as_mut() {
        log.flush()?;
    }
    Ok(())
}
