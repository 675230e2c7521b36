//! Uniform bucket grid for fast neighbor queries over world coordinates.

use glam::Vec2;

/// Spatial index over axis-aligned square buckets.
///
/// Rebuilt from scratch each tick; queries return every payload in buckets
/// overlapping the query's bounding square, so callers still filter by exact
/// distance.
#[derive(Clone, Debug)]
pub struct SpatialGrid<T> {
    cell_size: f32,
    cols: usize,
    rows: usize,
    /// buckets[row * cols + col]
    buckets: Vec<Vec<(Vec2, T)>>,
    len: usize,
}

impl<T: Copy> SpatialGrid<T> {
    /// Create a grid covering `width` x `height` with square buckets of `cell_size`.
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let cols = Self::span(width, cell_size);
        let rows = Self::span(height, cell_size);
        Self {
            cell_size,
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
            len: 0,
        }
    }

    fn span(extent: f32, cell_size: f32) -> usize {
        if extent.is_finite() && extent > 0.0 {
            ((extent / cell_size).ceil() as usize).max(1)
        } else {
            1
        }
    }

    /// Re-dimension the grid for a new world size. Drops all entries.
    pub fn resize(&mut self, width: f32, height: f32) {
        *self = Self::new(width, height, self.cell_size);
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    #[inline]
    fn cell_coord(&self, v: f32, max: usize) -> usize {
        if !v.is_finite() || v <= 0.0 {
            return 0;
        }
        ((v / self.cell_size) as usize).min(max - 1)
    }

    /// Insert a payload at the given position. Out-of-range positions land in the edge bucket.
    #[inline]
    pub fn insert(&mut self, x: f32, y: f32, payload: T) {
        let col = self.cell_coord(x, self.cols);
        let row = self.cell_coord(y, self.rows);
        self.buckets[row * self.cols + col].push((Vec2::new(x, y), payload));
        self.len += 1;
    }

    /// All payloads in buckets overlapping the circle's bounding square.
    pub fn query_circle(&self, x: f32, y: f32, r: f32) -> Vec<T> {
        let mut results = Vec::new();
        self.visit_circle(x, y, r, |_, payload| results.push(payload));
        results
    }

    /// Visit candidates around a circle without allocating.
    ///
    /// The callback receives the stored position alongside the payload.
    pub fn visit_circle<F>(&self, x: f32, y: f32, r: f32, mut f: F)
    where
        F: FnMut(Vec2, T),
    {
        if self.len == 0 || !r.is_finite() || r < 0.0 {
            return;
        }
        let col_min = self.cell_coord(x - r, self.cols);
        let col_max = self.cell_coord(x + r, self.cols);
        let row_min = self.cell_coord(y - r, self.rows);
        let row_max = self.cell_coord(y + r, self.rows);

        for row in row_min..=row_max {
            for col in col_min..=col_max {
                for &(pos, payload) in &self.buckets[row * self.cols + col] {
                    f(pos, payload);
                }
            }
        }
    }

    /// Number of stored payloads
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grid dimensions in buckets (columns, rows)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }
}
