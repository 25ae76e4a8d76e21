//! Spatial hashing for efficient neighbor search.
//!
//! The grid is a sorted-array bucket table: every particle produces a
//! `(cell key, index)` entry, entries are sorted by key, and each run of equal
//! keys becomes one cell. Lookups binary-search the cell table, so the
//! structure is a pair of flat arrays that can be read concurrently without
//! locking. It is rebuilt from scratch on every [`SpatialHashGrid::build`].

use bevy::prelude::*;
use rayon::prelude::*;

/// Bits per axis in a packed cell key.
const KEY_BITS: u32 = 21;
const KEY_MASK: u64 = (1 << KEY_BITS) - 1;
const KEY_BIAS: i64 = 1 << (KEY_BITS - 1);

/// Pack a cell coordinate into a 64-bit key.
///
/// The packing is exact for coordinates within ±2²⁰ cells of the origin and
/// wraps beyond that.
#[inline]
pub fn cell_key(cell: IVec3) -> u64 {
    let x = (cell.x as i64 + KEY_BIAS) as u64 & KEY_MASK;
    let y = (cell.y as i64 + KEY_BIAS) as u64 & KEY_MASK;
    let z = (cell.z as i64 + KEY_BIAS) as u64 & KEY_MASK;
    (x << (2 * KEY_BITS)) | (y << KEY_BITS) | z
}

#[inline]
fn cell_at(position: Vec3, cell_size: f32) -> IVec3 {
    (position / cell_size).floor().as_ivec3()
}

/// One occupied cell: a run of entries sharing a key.
#[derive(Clone, Copy, Debug)]
struct CellRange {
    key: u64,
    start: usize,
    count: usize,
}

/// Grid of particle indices bucketed by cell.
#[derive(Debug)]
pub struct SpatialHashGrid {
    cell_size: f32,
    /// `(cell key, particle index)`, sorted.
    entries: Vec<(u64, usize)>,
    /// Occupied cells, sorted by key.
    cells: Vec<CellRange>,
}

impl Default for SpatialHashGrid {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            entries: Vec::new(),
            cells: Vec::new(),
        }
    }
}

impl SpatialHashGrid {
    /// Create an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the grid from particle positions, discarding any previous contents.
    pub fn build(&mut self, positions: &[Vec3], cell_size: f32) {
        self.cell_size = cell_size;

        self.entries.clear();
        self.entries.par_extend(
            positions
                .par_iter()
                .enumerate()
                .map(|(i, &pos)| (cell_key(cell_at(pos, cell_size)), i)),
        );
        self.entries.par_sort_unstable();

        self.cells.clear();
        let mut start = 0;
        while start < self.entries.len() {
            let key = self.entries[start].0;
            let count = self.entries[start..]
                .iter()
                .take_while(|(k, _)| *k == key)
                .count();
            self.cells.push(CellRange { key, start, count });
            start += count;
        }
    }

    /// Calculate the grid cell for a position.
    #[inline]
    pub fn cell_of(&self, position: Vec3) -> IVec3 {
        cell_at(position, self.cell_size)
    }

    /// Cell size the grid was built with.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of indexed particles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Particle indices stored in a cell.
    pub fn cell_members(&self, cell: IVec3) -> impl Iterator<Item = usize> + '_ {
        let key = cell_key(cell);
        let range = match self.cells.binary_search_by_key(&key, |c| c.key) {
            Ok(found) => {
                let c = self.cells[found];
                c.start..c.start + c.count
            }
            Err(_) => 0..0,
        };
        self.entries[range].iter().map(|&(_, i)| i)
    }

    /// Cells a query of the given radius has to visit, per axis.
    #[inline]
    pub fn search_extent(&self, radius: f32) -> i32 {
        (radius / self.cell_size).ceil().max(1.0) as i32
    }

    /// Call `f` for every particle in the cell block covering `radius` around `position`.
    pub fn for_each_candidate(&self, position: Vec3, radius: f32, mut f: impl FnMut(usize)) {
        let center = self.cell_of(position);
        let extent = self.search_extent(radius);

        for dz in -extent..=extent {
            for dy in -extent..=extent {
                for dx in -extent..=extent {
                    let cell = center + IVec3::new(dx, dy, dz);
                    for j in self.cell_members(cell) {
                        f(j);
                    }
                }
            }
        }
    }

    /// Indices of all particles with `0 < distance < h` from `position`.
    pub fn neighbors(&self, position: Vec3, h: f32, positions: &[Vec3]) -> Vec<usize> {
        let mut out = Vec::new();
        self.neighbors_into(position, h, positions, &mut out);
        out
    }

    /// Like [`Self::neighbors`], appending into an existing buffer.
    pub fn neighbors_into(&self, position: Vec3, h: f32, positions: &[Vec3], out: &mut Vec<usize>) {
        let h_sq = h * h;
        self.for_each_candidate(position, h, |j| {
            let dist_sq = (positions[j] - position).length_squared();
            if dist_sq > 0.0 && dist_sq < h_sq {
                out.push(j);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_positions(seed: u64, count: usize, extent: f32) -> Vec<Vec3> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                )
            })
            .collect()
    }

    fn brute_force(positions: &[Vec3], position: Vec3, h: f32) -> Vec<usize> {
        positions
            .iter()
            .enumerate()
            .filter(|&(_, &p)| {
                let d = (p - position).length_squared();
                d > 0.0 && d < h * h
            })
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_cell_key_distinguishes_neighbors() {
        let center = IVec3::new(-3, 7, 0);
        let mut keys: Vec<u64> = (-1..=1)
            .flat_map(|dx| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dz| (dx, dy, dz))))
            .map(|(dx, dy, dz)| cell_key(center + IVec3::new(dx, dy, dz)))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 27);
    }

    #[test]
    fn test_position_to_cell() {
        let mut grid = SpatialHashGrid::new();
        grid.build(&[], 1.0);

        assert_eq!(grid.cell_of(Vec3::new(0.5, 0.5, 0.5)), IVec3::ZERO);
        assert_eq!(grid.cell_of(Vec3::new(1.5, 0.5, 0.5)), IVec3::new(1, 0, 0));
        assert_eq!(grid.cell_of(Vec3::new(-0.5, 0.5, 0.5)), IVec3::new(-1, 0, 0));
    }

    #[test]
    fn test_build_buckets_every_particle_once() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.1, 0.1, 0.1),
            Vec3::new(5.0, 5.0, 5.0),
        ];
        let mut grid = SpatialHashGrid::new();
        grid.build(&positions, 1.0);

        assert_eq!(grid.len(), 3);
        assert_eq!(grid.cell_count(), 2);
        let members: Vec<usize> = grid.cell_members(IVec3::ZERO).collect();
        assert_eq!(members, vec![0, 1]);

        // Rebuilding drops stale entries.
        grid.build(&positions[2..], 1.0);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell_members(IVec3::ZERO).count(), 0);
    }

    #[test]
    fn test_neighbors_exclude_self_and_far_particles() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.0, 0.3, 0.0),
        ];
        let mut grid = SpatialHashGrid::new();
        grid.build(&positions, 0.2);

        let neighbors = grid.neighbors(positions[0], 0.2, &positions);
        assert_eq!(neighbors, vec![1]);
    }

    #[test]
    fn test_neighbors_match_brute_force() {
        let h = 0.2;
        for seed in 0..5 {
            let positions = random_positions(seed, 200, 0.6);
            for &cell_size in &[0.5 * h, h, 1.7 * h] {
                let mut grid = SpatialHashGrid::new();
                grid.build(&positions, cell_size);

                for &p in &positions {
                    let mut found = grid.neighbors(p, h, &positions);
                    found.sort_unstable();
                    assert_eq!(found, brute_force(&positions, p, h), "seed {seed}, cell {cell_size}");
                }
            }
        }
    }
}
