//! Density and speed diagnostics.

use std::io::{self, Write};

use bevy::prelude::*;

use super::neighbors::NeighborLists;
use super::params::FluidParams;
use super::particle::Particle;
use super::solver::ConstraintSolver;
use super::spatial::SpatialHashGrid;

/// Summary of the particle array after a step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DensityStatistics {
    pub particle_count: usize,
    pub min_density: f32,
    pub max_density: f32,
    pub avg_density: f32,
    pub max_speed: f32,
    pub avg_speed: f32,
}

/// Statistics over the densities stored by the last solver iteration.
///
/// An empty array gives all-zero statistics.
pub fn compute_statistics(particles: &[Particle]) -> DensityStatistics {
    if particles.is_empty() {
        return DensityStatistics::default();
    }

    let mut stats = DensityStatistics {
        particle_count: particles.len(),
        min_density: f32::INFINITY,
        max_density: f32::NEG_INFINITY,
        ..default()
    };
    let mut density_sum = 0.0;
    let mut speed_sum = 0.0;

    for p in particles {
        stats.min_density = stats.min_density.min(p.density);
        stats.max_density = stats.max_density.max(p.density);
        density_sum += p.density;

        let speed = p.velocity.length();
        stats.max_speed = stats.max_speed.max(speed);
        speed_sum += speed;
    }

    let n = particles.len() as f32;
    stats.avg_density = density_sum / n;
    stats.avg_speed = speed_sum / n;
    stats
}

/// Mean `|density / rest_density - 1|` with densities re-evaluated at the
/// current positions.
pub fn mean_density_error(particles: &[Particle], params: &FluidParams) -> f32 {
    if particles.is_empty() {
        return 0.0;
    }

    let positions: Vec<Vec3> = particles.iter().map(|p| p.position).collect();
    let mut grid = SpatialHashGrid::new();
    grid.build(&positions, params.cell_size());
    let mut neighbors = NeighborLists::default();
    neighbors.build(&grid, &positions, params.smoothing_radius, params.max_neighbors);

    let settled: Vec<Particle> = particles
        .iter()
        .map(|p| Particle {
            predicted_position: p.position,
            ..*p
        })
        .collect();
    let densities = ConstraintSolver::new(params, &neighbors).compute_densities(&settled);

    let total: f32 = densities
        .iter()
        .map(|density| (density / params.rest_density - 1.0).abs())
        .sum();
    total / particles.len() as f32
}

/// Per-frame density log in CSV form.
pub struct DensityLog<W: Write> {
    writer: W,
    frame: u64,
}

impl<W: Write> DensityLog<W> {
    pub const HEADER: &'static str = "Frame,AverageDensity,MaximumDensity,RestDensity";

    /// Wrap `writer` and emit the header row.
    pub fn new(mut writer: W) -> io::Result<Self> {
        writeln!(writer, "{}", Self::HEADER)?;
        Ok(Self { writer, frame: 0 })
    }

    /// Append one row for `stats`. Frames are numbered from 1.
    pub fn record(&mut self, stats: &DensityStatistics, rest_density: f32) -> io::Result<()> {
        self.frame += 1;
        writeln!(
            self.writer,
            "{},{},{},{}",
            self.frame, stats.avg_density, stats.max_density, rest_density
        )
    }

    /// Number of rows written so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
