//! Uniform planar hash grid used to narrow admission candidates.
//!
//! The grid buckets descriptor ids by the X/Y cell their position falls in.
//! A range query returns every id in the cells overlapping the query circle's
//! bounding square; exact distance filtering stays with the caller.

use std::collections::HashMap;

use streamer_entity::DescriptorId;
use streamer_math::Vec3;

type CellKey = (i32, i32);

/// Spatial hash grid over descriptor positions.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<DescriptorId>>,
    cell_of: HashMap<DescriptorId, CellKey>,
}

impl SpatialGrid {
    /// Create an empty grid. `cell_size` must be positive and finite; callers
    /// validate it through [`GridConfig`](crate::config::GridConfig).
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            cell_of: HashMap::new(),
        }
    }

    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn key(&self, position: Vec3) -> CellKey {
        // Float-to-int casts saturate, so far-flung positions land in edge cells.
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Index `id` at `position`, moving it if already indexed.
    pub fn insert(&mut self, id: DescriptorId, position: Vec3) {
        self.remove(id);
        let key = self.key(position);
        self.cells.entry(key).or_default().push(id);
        self.cell_of.insert(id, key);
    }

    /// Drop `id` from the index. Returns `false` if it was not indexed.
    pub fn remove(&mut self, id: DescriptorId) -> bool {
        let Some(key) = self.cell_of.remove(&id) else {
            return false;
        };
        if let Some(bucket) = self.cells.get_mut(&key) {
            if let Some(pos) = bucket.iter().position(|e| *e == id) {
                bucket.swap_remove(pos);
            }
            if bucket.is_empty() {
                self.cells.remove(&key);
            }
        }
        true
    }

    /// Append to `out` every id whose cell overlaps the square of half-width
    /// `radius` centred on `center`.
    ///
    /// When the square spans more cells than are occupied, the occupied cells
    /// are scanned instead, so a huge radius never costs more than a linear
    /// pass.
    pub fn candidates(&self, center: Vec3, radius: f32, out: &mut Vec<DescriptorId>) {
        let (min_x, min_y) = self.key(center - Vec3::new(radius, radius, 0.0));
        let (max_x, max_y) = self.key(center + Vec3::new(radius, radius, 0.0));

        let span = (i64::from(max_x) - i64::from(min_x) + 1)
            .saturating_mul(i64::from(max_y) - i64::from(min_y) + 1);

        if span > self.cells.len() as i64 {
            for (&(x, y), bucket) in &self.cells {
                if (min_x..=max_x).contains(&x) && (min_y..=max_y).contains(&y) {
                    out.extend_from_slice(bucket);
                }
            }
            return;
        }

        for x in min_x..=max_x {
            for y in min_y..=max_y {
                if let Some(bucket) = self.cells.get(&(x, y)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    /// Rebuild from scratch, compacting bucket storage.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (DescriptorId, Vec3)>) {
        self.cells.clear();
        self.cell_of.clear();
        for (id, position) in entries {
            self.insert(id, position);
        }
        self.cells.shrink_to_fit();
        self.cell_of.shrink_to_fit();
    }

    /// Remove everything and release storage.
    pub fn clear(&mut self) {
        self.cells = HashMap::new();
        self.cell_of = HashMap::new();
    }

    /// Number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cell_of.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cell_of.is_empty()
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}
