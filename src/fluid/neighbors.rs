//! Per-step neighbor lists.
//!
//! Lists are gathered from the grid and stored compressed (one offsets array,
//! one flat index array). They describe the positions the grid was built
//! from and are never carried into another step.

use bevy::prelude::*;
use rayon::prelude::*;

use super::spatial::SpatialHashGrid;

/// Neighbor indices of every particle.
#[derive(Default, Debug)]
pub struct NeighborLists {
    /// `offsets[i]..offsets[i + 1]` is the range of particle `i` in `indices`.
    offsets: Vec<usize>,
    indices: Vec<usize>,
}

impl NeighborLists {
    /// Gather neighbors (`0 < distance < h`) for every position.
    ///
    /// With `max_neighbors > 0` each list is truncated to the closest
    /// `max_neighbors` candidates.
    pub fn build(&mut self, grid: &SpatialHashGrid, positions: &[Vec3], h: f32, max_neighbors: u32) {
        let lists: Vec<Vec<usize>> = positions
            .par_iter()
            .map(|&pos| {
                let mut list = Vec::with_capacity(64);
                grid.neighbors_into(pos, h, positions, &mut list);
                if max_neighbors > 0 && list.len() > max_neighbors as usize {
                    list.sort_by(|&a, &b| {
                        let da = (positions[a] - pos).length_squared();
                        let db = (positions[b] - pos).length_squared();
                        da.total_cmp(&db).then(a.cmp(&b))
                    });
                    list.truncate(max_neighbors as usize);
                }
                list
            })
            .collect();

        self.offsets.clear();
        self.indices.clear();
        self.offsets.reserve(lists.len() + 1);
        self.offsets.push(0);
        for list in &lists {
            self.indices.extend_from_slice(list);
            self.offsets.push(self.indices.len());
        }
    }

    /// Neighbors of particle `i`.
    #[inline]
    pub fn get(&self, i: usize) -> &[usize] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Number of particles the lists were built for.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of neighbor pairs (counted once per side).
    pub fn pair_count(&self) -> usize {
        self.indices.len()
    }

    /// Mean neighbor count.
    pub fn average_count(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.pair_count() as f32 / self.len() as f32
    }
}
